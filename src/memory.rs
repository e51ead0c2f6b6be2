//! In-process store speaking the same command/reply shapes as the real one.
//!
//! Covers the commands the facade issues (plus PING and FLUSHDB). Useful as
//! a test double and for running without a store server. Expiry is lazy:
//! an expired key is dropped the next time anything touches it.

use std::collections::btree_map;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use redis::{Arg, Cmd, ErrorKind, RedisError, RedisResult, Value};
use tokio::sync::Notify;

use crate::glob::Glob;
use crate::transport::Transport;

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";
const NOT_INTEGER: &str = "ERR value is not an integer or out of range";
const NOT_FLOAT: &str = "ERR value is not a valid float";
const SYNTAX: &str = "ERR syntax error";
const TIMEOUT_RANGE: &str = "ERR timeout is out of range";

#[derive(Debug, Clone)]
enum Data {
    Str(Vec<u8>),
    Hash(HashMap<Vec<u8>, Vec<u8>>),
    /// Kept sorted by (score, member)
    ZSet(Vec<(f64, Vec<u8>)>),
    List(VecDeque<Vec<u8>>),
}

#[derive(Debug, Clone)]
struct Entry {
    data: Data,
    expire_at: Option<Instant>,
    /// Creation order; SCAN cursors walk keys by this number
    seq: u64,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expire_at.is_some_and(|at| at <= now)
    }
}

#[derive(Default)]
struct State {
    keys: BTreeMap<String, Entry>,
    /// Sequence number handed to the next newly created key
    next_seq: u64,
    /// Pending injected failures, by command name ("*" = any command)
    failures: HashMap<String, usize>,
}

impl State {
    fn purge(&mut self, key: &str) {
        let now = Instant::now();
        if self.keys.get(key).is_some_and(|e| e.is_expired(now)) {
            self.keys.remove(key);
        }
    }

    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        self.purge(key);
        self.keys.get_mut(key)
    }

    fn live_keys(&mut self) -> Vec<String> {
        let now = Instant::now();
        self.keys.retain(|_, e| !e.is_expired(now));
        self.keys.keys().cloned().collect()
    }

    /// Live keys created at or after `seq`, in creation order.
    fn live_keys_since(&mut self, seq: u64) -> Vec<(u64, String)> {
        let now = Instant::now();
        self.keys.retain(|_, e| !e.is_expired(now));
        let mut keys: Vec<(u64, String)> = self
            .keys
            .iter()
            .filter(|(_, e)| e.seq >= seq)
            .map(|(k, e)| (e.seq, k.clone()))
            .collect();
        keys.sort_unstable_by_key(|(seq, _)| *seq);
        keys
    }

    /// Replace the value at `key`. An existing key keeps its place in the
    /// SCAN order.
    fn put(&mut self, key: String, data: Data, expire_at: Option<Instant>) {
        let entry = self.entry_or_insert(key, || Data::Str(Vec::new()));
        entry.data = data;
        entry.expire_at = expire_at;
    }

    /// The live entry at `key`, created from `init` if absent.
    fn entry_or_insert(&mut self, key: String, init: impl FnOnce() -> Data) -> &mut Entry {
        self.purge(&key);
        match self.keys.entry(key) {
            btree_map::Entry::Occupied(slot) => slot.into_mut(),
            btree_map::Entry::Vacant(slot) => {
                self.next_seq += 1;
                slot.insert(Entry {
                    data: init(),
                    expire_at: None,
                    seq: self.next_seq,
                })
            }
        }
    }

    fn take_failure(&mut self, command: &str) -> bool {
        for slot in [command, "*"] {
            if let Some(left) = self.failures.get_mut(slot) {
                if *left > 0 {
                    *left -= 1;
                    return true;
                }
            }
        }
        false
    }
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    /// Woken whenever an element lands on any list
    pushed: Notify,
}

/// Shared in-memory store. Clones refer to the same keyspace.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` invocations of `command` fail with an I/O
    /// error, as a dropped connection would. `"*"` matches every command.
    pub fn fail_command(&self, command: &str, count: usize) {
        let mut state = self.lock();
        *state.failures.entry(command.to_uppercase()).or_insert(0) += count;
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.lock().live_keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn dispatch(&self, cmd: &Cmd) -> RedisResult<Value> {
        let mut args: Vec<Vec<u8>> = cmd
            .args_iter()
            .map(|arg| match arg {
                Arg::Simple(bytes) => bytes.to_vec(),
                Arg::Cursor => b"0".to_vec(),
            })
            .collect();
        if args.is_empty() {
            return Err(server_error("ERR empty command"));
        }
        let name = String::from_utf8_lossy(&args.remove(0)).to_uppercase();

        if self.injected_failure(&name) {
            return Err(RedisError::from(io::Error::new(
                io::ErrorKind::ConnectionReset,
                format!("injected failure for {}", name),
            )));
        }

        if name == "BLPOP" {
            return self.blpop(&args).await;
        }

        let reply = self.apply(&name, &args);
        if name == "RPUSH" && reply.is_ok() {
            self.inner.pushed.notify_waiters();
        }
        reply
    }

    fn injected_failure(&self, command: &str) -> bool {
        self.lock().take_failure(command)
    }

    fn apply(&self, name: &str, args: &[Vec<u8>]) -> RedisResult<Value> {
        let mut state = self.lock();
        match name {
            "PING" => Ok(Value::Status("PONG".to_string())),
            "FLUSHDB" => {
                state.keys.clear();
                Ok(Value::Okay)
            }
            "GET" => cmd_get(&mut state, args),
            "SET" => cmd_set(&mut state, args),
            "MSET" => cmd_mset(&mut state, args),
            "EXISTS" => cmd_exists(&mut state, args),
            "DEL" => cmd_del(&mut state, args),
            "EXPIRE" => cmd_expire(&mut state, args),
            "TTL" => cmd_ttl(&mut state, args, 1000),
            "PTTL" => cmd_ttl(&mut state, args, 1),
            "KEYS" => cmd_keys(&mut state, args),
            "SCAN" => cmd_scan(&mut state, args),
            "HGET" => cmd_hget(&mut state, args),
            "HSET" => cmd_hset(&mut state, args),
            "HDEL" => cmd_hdel(&mut state, args),
            "ZADD" => cmd_zadd(&mut state, args),
            "ZRANK" => cmd_zrank(&mut state, args),
            "ZRANGE" => cmd_zrange(&mut state, args),
            "ZREM" => cmd_zrem(&mut state, args),
            "RPUSH" => cmd_rpush(&mut state, args),
            "LLEN" => cmd_llen(&mut state, args),
            "LRANGE" => cmd_lrange(&mut state, args),
            other => Err(server_error(&format!("ERR unknown command '{}'", other))),
        }
    }

    /// BLPOP key [key ...] timeout
    async fn blpop(&self, args: &[Vec<u8>]) -> RedisResult<Value> {
        let (timeout, keys) = match args.split_last() {
            Some((timeout, keys)) if !keys.is_empty() => (parse_f64(timeout)?, keys),
            _ => return Err(arity("blpop")),
        };
        if timeout < 0.0 {
            return Err(server_error("ERR timeout is negative"));
        }
        let keys: Vec<String> = keys.iter().map(|k| text(k)).collect();
        // Zero waits forever
        let deadline = if timeout > 0.0 {
            let wait = Duration::try_from_secs_f64(timeout).map_err(|_| server_error(TIMEOUT_RANGE))?;
            let at = tokio::time::Instant::now()
                .checked_add(wait)
                .ok_or_else(|| server_error(TIMEOUT_RANGE))?;
            Some(at)
        } else {
            None
        };

        loop {
            let notified = self.inner.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some((key, value)) = self.pop_first(&keys)? {
                return Ok(Value::Bulk(vec![Value::Data(key.into_bytes()), Value::Data(value)]));
            }

            match deadline {
                Some(at) => {
                    if tokio::time::timeout_at(at, notified).await.is_err() {
                        return Ok(Value::Nil);
                    }
                }
                None => notified.await,
            }
        }
    }

    fn pop_first(&self, keys: &[String]) -> RedisResult<Option<(String, Vec<u8>)>> {
        let mut state = self.lock();
        for key in keys {
            let Some(entry) = state.live(key) else {
                continue;
            };
            let Data::List(list) = &mut entry.data else {
                return Err(server_error(WRONGTYPE));
            };
            if let Some(value) = list.pop_front() {
                if list.is_empty() {
                    state.keys.remove(key);
                }
                return Ok(Some((key.clone(), value)));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Transport for MemoryStore {
    async fn execute(&self, cmd: &Cmd) -> RedisResult<Value> {
        self.dispatch(cmd).await
    }

    async fn execute_blocking(&self, cmd: &Cmd) -> RedisResult<Value> {
        self.dispatch(cmd).await
    }
}

/// Build the error a real server would send for `-<message>`, so callers
/// see the same error kind and code.
fn server_error(message: &str) -> RedisError {
    match redis::parse_redis_value(format!("-{}\r\n", message).as_bytes()) {
        Err(e) => e,
        Ok(_) => RedisError::from((ErrorKind::ResponseError, "unparsable error reply")),
    }
}

fn arity(command: &str) -> RedisError {
    server_error(&format!("ERR wrong number of arguments for '{}' command", command))
}

fn invalid_expire(command: &str) -> RedisError {
    server_error(&format!("ERR invalid expire time in '{}' command", command))
}

/// Instant `ms` milliseconds from now. The absolute unix time in
/// milliseconds must fit in an i64.
fn expire_deadline(ms: i64, command: &str) -> RedisResult<Instant> {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX));
    if now_ms.checked_add(ms).is_none() {
        return Err(invalid_expire(command));
    }
    Instant::now()
        .checked_add(Duration::from_millis(ms.unsigned_abs()))
        .ok_or_else(|| invalid_expire(command))
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn parse_i64(bytes: &[u8]) -> RedisResult<i64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| server_error(NOT_INTEGER))
}

fn parse_f64(bytes: &[u8]) -> RedisResult<f64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|f| !f.is_nan())
        .ok_or_else(|| server_error(NOT_FLOAT))
}

/// Resolve an inclusive, possibly negative index range against `len`.
fn resolve_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (start + len).max(0) } else { start };
    let stop = if stop < 0 { stop + len } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

fn format_score(score: f64) -> Vec<u8> {
    score.to_string().into_bytes()
}

fn bulk(items: impl IntoIterator<Item = Vec<u8>>) -> Value {
    Value::Bulk(items.into_iter().map(Value::Data).collect())
}

fn cmd_get(state: &mut State, args: &[Vec<u8>]) -> RedisResult<Value> {
    let [key] = args else { return Err(arity("get")) };
    match state.live(&text(key)) {
        None => Ok(Value::Nil),
        Some(Entry { data: Data::Str(v), .. }) => Ok(Value::Data(v.clone())),
        Some(_) => Err(server_error(WRONGTYPE)),
    }
}

/// SET key value [PX ms | EX s]
fn cmd_set(state: &mut State, args: &[Vec<u8>]) -> RedisResult<Value> {
    let (key, value, opts) = match args {
        [key, value, opts @ ..] => (text(key), value.clone(), opts),
        _ => return Err(arity("set")),
    };
    let expire_at = match opts {
        [] => None,
        [unit, amount] => {
            let amount = parse_i64(amount)?;
            if amount <= 0 {
                return Err(invalid_expire("set"));
            }
            let ms = match text(unit).to_uppercase().as_str() {
                "PX" => amount,
                "EX" => amount.checked_mul(1000).ok_or_else(|| invalid_expire("set"))?,
                _ => return Err(server_error(SYNTAX)),
            };
            Some(expire_deadline(ms, "set")?)
        }
        _ => return Err(server_error(SYNTAX)),
    };

    state.put(key, Data::Str(value), expire_at);
    Ok(Value::Okay)
}

fn cmd_mset(state: &mut State, args: &[Vec<u8>]) -> RedisResult<Value> {
    if args.is_empty() || args.len() % 2 != 0 {
        return Err(arity("mset"));
    }
    for pair in args.chunks(2) {
        state.put(text(&pair[0]), Data::Str(pair[1].clone()), None);
    }
    Ok(Value::Okay)
}

fn cmd_exists(state: &mut State, args: &[Vec<u8>]) -> RedisResult<Value> {
    if args.is_empty() {
        return Err(arity("exists"));
    }
    let count = args.iter().filter(|k| state.live(&text(k)).is_some()).count();
    Ok(Value::Int(count as i64))
}

fn cmd_del(state: &mut State, args: &[Vec<u8>]) -> RedisResult<Value> {
    if args.is_empty() {
        return Err(arity("del"));
    }
    let mut count = 0;
    for key in args {
        let key = text(key);
        state.purge(&key);
        if state.keys.remove(&key).is_some() {
            count += 1;
        }
    }
    Ok(Value::Int(count))
}

fn cmd_expire(state: &mut State, args: &[Vec<u8>]) -> RedisResult<Value> {
    let [key, seconds] = args else { return Err(arity("expire")) };
    let key = text(key);
    let seconds = parse_i64(seconds)?;
    if state.live(&key).is_none() {
        return Ok(Value::Int(0));
    }
    if seconds <= 0 {
        state.keys.remove(&key);
    } else if let Some(entry) = state.keys.get_mut(&key) {
        let ms = seconds.checked_mul(1000).ok_or_else(|| invalid_expire("expire"))?;
        entry.expire_at = Some(expire_deadline(ms, "expire")?);
    }
    Ok(Value::Int(1))
}

/// TTL/PTTL: -2 for a missing key, -1 for a key without expiry
fn cmd_ttl(state: &mut State, args: &[Vec<u8>], unit_ms: u128) -> RedisResult<Value> {
    let [key] = args else { return Err(arity("ttl")) };
    let remaining = match state.live(&text(key)) {
        None => -2,
        Some(Entry { expire_at: None, .. }) => -1,
        Some(Entry { expire_at: Some(at), .. }) => {
            let ms = at.saturating_duration_since(Instant::now()).as_millis();
            ((ms + unit_ms / 2) / unit_ms) as i64
        }
    };
    Ok(Value::Int(remaining))
}

fn cmd_keys(state: &mut State, args: &[Vec<u8>]) -> RedisResult<Value> {
    let [pattern] = args else { return Err(arity("keys")) };
    let glob = Glob::new(&text(pattern));
    let keys = state.live_keys().into_iter().filter(|k| glob.matches(k));
    Ok(bulk(keys.map(String::into_bytes)))
}

/// SCAN cursor [MATCH pattern] [COUNT count]
///
/// The cursor is the creation sequence number to resume from, so deleting
/// keys mid-walk never shifts the rest past it. COUNT bounds how many keys
/// are examined, so a page may hold fewer matches than COUNT, or none,
/// before the cursor returns to 0.
fn cmd_scan(state: &mut State, args: &[Vec<u8>]) -> RedisResult<Value> {
    let (cursor, opts) = match args.split_first() {
        Some((cursor, opts)) => (parse_i64(cursor)?, opts),
        None => return Err(arity("scan")),
    };
    if cursor < 0 || opts.len() % 2 != 0 {
        return Err(server_error(SYNTAX));
    }

    let mut glob = None;
    let mut count = 10usize;
    for pair in opts.chunks(2) {
        match text(&pair[0]).to_uppercase().as_str() {
            "MATCH" => glob = Some(Glob::new(&text(&pair[1]))),
            "COUNT" => {
                count = parse_i64(&pair[1])?.try_into().map_err(|_| server_error(SYNTAX))?;
                if count == 0 {
                    return Err(server_error(SYNTAX));
                }
            }
            _ => return Err(server_error(SYNTAX)),
        }
    }

    let mut pending = state.live_keys_since(cursor as u64);
    let more = pending.len() > count;
    pending.truncate(count);
    let next = match pending.last() {
        Some((seq, _)) if more => seq + 1,
        _ => 0,
    };

    let page = pending
        .into_iter()
        .map(|(_, k)| k)
        .filter(|k| glob.as_ref().map_or(true, |g| g.matches(k)))
        .map(String::into_bytes);

    Ok(Value::Bulk(vec![
        Value::Data(next.to_string().into_bytes()),
        bulk(page),
    ]))
}

fn cmd_hget(state: &mut State, args: &[Vec<u8>]) -> RedisResult<Value> {
    let [key, field] = args else { return Err(arity("hget")) };
    match state.live(&text(key)) {
        None => Ok(Value::Nil),
        Some(Entry { data: Data::Hash(h), .. }) => {
            Ok(h.get(field).map_or(Value::Nil, |v| Value::Data(v.clone())))
        }
        Some(_) => Err(server_error(WRONGTYPE)),
    }
}

/// HSET key field value [field value ...]
fn cmd_hset(state: &mut State, args: &[Vec<u8>]) -> RedisResult<Value> {
    if args.len() < 3 || args.len() % 2 != 1 {
        return Err(arity("hset"));
    }
    let key = text(&args[0]);
    let entry = state.entry_or_insert(key, || Data::Hash(HashMap::new()));
    let Data::Hash(hash) = &mut entry.data else {
        return Err(server_error(WRONGTYPE));
    };
    let mut added = 0;
    for pair in args[1..].chunks(2) {
        if hash.insert(pair[0].clone(), pair[1].clone()).is_none() {
            added += 1;
        }
    }
    Ok(Value::Int(added))
}

fn cmd_hdel(state: &mut State, args: &[Vec<u8>]) -> RedisResult<Value> {
    let Some((key, fields)) = args.split_first().filter(|(_, f)| !f.is_empty()) else {
        return Err(arity("hdel"));
    };
    let key = text(key);
    let Some(entry) = state.live(&key) else {
        return Ok(Value::Int(0));
    };
    let Data::Hash(hash) = &mut entry.data else {
        return Err(server_error(WRONGTYPE));
    };
    let removed = fields.iter().filter(|f| hash.remove(*f).is_some()).count();
    if hash.is_empty() {
        state.keys.remove(&key);
    }
    Ok(Value::Int(removed as i64))
}

/// ZADD key score member [score member ...]
fn cmd_zadd(state: &mut State, args: &[Vec<u8>]) -> RedisResult<Value> {
    if args.len() < 3 || args.len() % 2 != 1 {
        return Err(arity("zadd"));
    }
    let pairs = args[1..]
        .chunks(2)
        .map(|pair| Ok((parse_f64(&pair[0])?, pair[1].clone())))
        .collect::<RedisResult<Vec<_>>>()?;

    let key = text(&args[0]);
    let entry = state.entry_or_insert(key, || Data::ZSet(Vec::new()));
    let Data::ZSet(zset) = &mut entry.data else {
        return Err(server_error(WRONGTYPE));
    };

    let mut added = 0;
    for (score, member) in pairs {
        match zset.iter_mut().find(|(_, m)| *m == member) {
            Some(existing) => existing.0 = score,
            None => {
                zset.push((score, member));
                added += 1;
            }
        }
    }
    zset.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    Ok(Value::Int(added))
}

fn cmd_zrank(state: &mut State, args: &[Vec<u8>]) -> RedisResult<Value> {
    let [key, member] = args else { return Err(arity("zrank")) };
    match state.live(&text(key)) {
        None => Ok(Value::Nil),
        Some(Entry { data: Data::ZSet(zset), .. }) => Ok(zset
            .iter()
            .position(|(_, m)| m == member)
            .map_or(Value::Nil, |rank| Value::Int(rank as i64))),
        Some(_) => Err(server_error(WRONGTYPE)),
    }
}

/// ZRANGE key start stop [WITHSCORES]
fn cmd_zrange(state: &mut State, args: &[Vec<u8>]) -> RedisResult<Value> {
    let (key, start, stop, with_scores) = match args {
        [key, start, stop] => (key, start, stop, false),
        [key, start, stop, flag] if text(flag).eq_ignore_ascii_case("WITHSCORES") => {
            (key, start, stop, true)
        }
        [_, _, _, _] => return Err(server_error(SYNTAX)),
        _ => return Err(arity("zrange")),
    };
    let (start, stop) = (parse_i64(start)?, parse_i64(stop)?);

    let zset = match state.live(&text(key)) {
        None => return Ok(Value::Bulk(Vec::new())),
        Some(Entry { data: Data::ZSet(zset), .. }) => zset,
        Some(_) => return Err(server_error(WRONGTYPE)),
    };
    let Some((from, to)) = resolve_range(start, stop, zset.len()) else {
        return Ok(Value::Bulk(Vec::new()));
    };

    let mut out = Vec::new();
    for (score, member) in &zset[from..=to] {
        out.push(member.clone());
        if with_scores {
            out.push(format_score(*score));
        }
    }
    Ok(bulk(out))
}

fn cmd_zrem(state: &mut State, args: &[Vec<u8>]) -> RedisResult<Value> {
    let Some((key, members)) = args.split_first().filter(|(_, m)| !m.is_empty()) else {
        return Err(arity("zrem"));
    };
    let key = text(key);
    let Some(entry) = state.live(&key) else {
        return Ok(Value::Int(0));
    };
    let Data::ZSet(zset) = &mut entry.data else {
        return Err(server_error(WRONGTYPE));
    };
    let before = zset.len();
    zset.retain(|(_, m)| !members.contains(m));
    let removed = before - zset.len();
    if zset.is_empty() {
        state.keys.remove(&key);
    }
    Ok(Value::Int(removed as i64))
}

fn cmd_rpush(state: &mut State, args: &[Vec<u8>]) -> RedisResult<Value> {
    let Some((key, values)) = args.split_first().filter(|(_, v)| !v.is_empty()) else {
        return Err(arity("rpush"));
    };
    let key = text(key);
    let entry = state.entry_or_insert(key, || Data::List(VecDeque::new()));
    let Data::List(list) = &mut entry.data else {
        return Err(server_error(WRONGTYPE));
    };
    list.extend(values.iter().cloned());
    Ok(Value::Int(list.len() as i64))
}

fn cmd_llen(state: &mut State, args: &[Vec<u8>]) -> RedisResult<Value> {
    let [key] = args else { return Err(arity("llen")) };
    match state.live(&text(key)) {
        None => Ok(Value::Int(0)),
        Some(Entry { data: Data::List(list), .. }) => Ok(Value::Int(list.len() as i64)),
        Some(_) => Err(server_error(WRONGTYPE)),
    }
}

fn cmd_lrange(state: &mut State, args: &[Vec<u8>]) -> RedisResult<Value> {
    let [key, start, stop] = args else { return Err(arity("lrange")) };
    let (start, stop) = (parse_i64(start)?, parse_i64(stop)?);
    let list = match state.live(&text(key)) {
        None => return Ok(Value::Bulk(Vec::new())),
        Some(Entry { data: Data::List(list), .. }) => list,
        Some(_) => return Err(server_error(WRONGTYPE)),
    };
    let Some((from, to)) = resolve_range(start, stop, list.len()) else {
        return Ok(Value::Bulk(Vec::new()));
    };
    Ok(bulk(list.range(from..=to).cloned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(store: &MemoryStore, cmd: &Cmd) -> RedisResult<Value> {
        store.execute(cmd).await
    }

    #[test]
    fn test_resolve_range() {
        assert_eq!(resolve_range(0, -1, 3), Some((0, 2)));
        assert_eq!(resolve_range(1, 1, 3), Some((1, 1)));
        assert_eq!(resolve_range(-2, -1, 3), Some((1, 2)));
        assert_eq!(resolve_range(0, 100, 3), Some((0, 2)));
        assert_eq!(resolve_range(-100, 0, 3), Some((0, 0)));
        assert_eq!(resolve_range(2, 1, 3), None);
        assert_eq!(resolve_range(5, 10, 3), None);
        assert_eq!(resolve_range(0, -1, 0), None);
    }

    #[tokio::test]
    async fn test_set_get_overwrite() {
        let store = MemoryStore::new();
        run(&store, redis::cmd("SET").arg("k").arg("v1")).await.unwrap();
        run(&store, redis::cmd("SET").arg("k").arg("v2")).await.unwrap();
        let value = run(&store, redis::cmd("GET").arg("k")).await.unwrap();
        assert_eq!(value, Value::Data(b"v2".to_vec()));
        assert_eq!(run(&store, redis::cmd("GET").arg("nope")).await.unwrap(), Value::Nil);
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let store = MemoryStore::new();
        run(&store, redis::cmd("RPUSH").arg("list").arg("a")).await.unwrap();
        let err = run(&store, redis::cmd("GET").arg("list")).await.unwrap_err();
        assert!(err.to_string().contains("WRONGTYPE"));
    }

    #[tokio::test]
    async fn test_set_px_expires() {
        let store = MemoryStore::new();
        run(&store, redis::cmd("SET").arg("k").arg("v").arg("PX").arg(30))
            .await
            .unwrap();
        let pttl = run(&store, redis::cmd("PTTL").arg("k")).await.unwrap();
        assert!(matches!(pttl, Value::Int(ms) if ms > 0 && ms <= 30));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(run(&store, redis::cmd("EXISTS").arg("k")).await.unwrap(), Value::Int(0));
        assert_eq!(run(&store, redis::cmd("PTTL").arg("k")).await.unwrap(), Value::Int(-2));
    }

    #[tokio::test]
    async fn test_scan_pages_cover_keyspace() {
        let store = MemoryStore::new();
        for i in 0..25 {
            run(&store, redis::cmd("SET").arg(format!("k:{}", i)).arg(i)).await.unwrap();
        }

        let mut cursor = 0u64;
        let mut seen = Vec::new();
        let mut pages = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::from_redis_value(
                &run(&store, redis::cmd("SCAN").arg(cursor).arg("MATCH").arg("k:*").arg("COUNT").arg(10))
                    .await
                    .unwrap(),
            )
            .unwrap();
            seen.extend(keys);
            pages += 1;
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        assert_eq!(pages, 3);
        assert_eq!(seen.len(), 25);
    }

    async fn scan_page(store: &MemoryStore, cursor: u64, count: usize) -> (u64, Vec<String>) {
        let reply = run(store, redis::cmd("SCAN").arg(cursor).arg("COUNT").arg(count))
            .await
            .unwrap();
        redis::from_redis_value(&reply).unwrap()
    }

    #[tokio::test]
    async fn test_scan_survives_deletes_behind_cursor() {
        let store = MemoryStore::new();
        for key in ["a:0", "k:0", "k:1", "k:2", "k:3"] {
            run(&store, redis::cmd("SET").arg(key).arg("v")).await.unwrap();
        }

        let (mut cursor, mut seen) = scan_page(&store, 0, 2).await;
        run(&store, redis::cmd("DEL").arg("a:0")).await.unwrap();
        while cursor != 0 {
            let (next, keys) = scan_page(&store, cursor, 2).await;
            seen.extend(keys);
            cursor = next;
        }
        seen.sort();
        assert_eq!(seen, vec!["a:0", "k:0", "k:1", "k:2", "k:3"]);
    }

    #[tokio::test]
    async fn test_overwrite_keeps_scan_position() {
        let store = MemoryStore::new();
        for key in ["x", "y", "z"] {
            run(&store, redis::cmd("SET").arg(key).arg("1")).await.unwrap();
        }
        let (cursor, first) = scan_page(&store, 0, 2).await;
        assert_eq!(first, vec!["x", "y"]);

        run(&store, redis::cmd("SET").arg("x").arg("2")).await.unwrap();
        let (next, rest) = scan_page(&store, cursor, 2).await;
        assert_eq!(rest, vec!["z"]);
        assert_eq!(next, 0);
    }

    #[tokio::test]
    async fn test_out_of_range_expiry_is_rejected() {
        let store = MemoryStore::new();
        let err = run(&store, redis::cmd("SET").arg("k").arg("v").arg("PX").arg(i64::MAX))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid expire time"));
        assert_eq!(run(&store, redis::cmd("EXISTS").arg("k")).await.unwrap(), Value::Int(0));

        run(&store, redis::cmd("SET").arg("k").arg("v")).await.unwrap();
        let err = run(&store, redis::cmd("EXPIRE").arg("k").arg(i64::MAX))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid expire time"));
        assert_eq!(run(&store, redis::cmd("PTTL").arg("k")).await.unwrap(), Value::Int(-1));
    }

    #[tokio::test]
    async fn test_blpop_huge_timeout_is_rejected() {
        let store = MemoryStore::new();
        let err = run(&store, redis::cmd("BLPOP").arg("q").arg(1e300)).await.unwrap_err();
        assert!(err.to_string().contains("timeout is out of range"));
    }

    #[tokio::test]
    async fn test_zset_order_and_tiebreak() {
        let store = MemoryStore::new();
        for (score, member) in [(2, "b"), (1, "z"), (2, "a")] {
            run(&store, redis::cmd("ZADD").arg("z").arg(score).arg(member)).await.unwrap();
        }
        let members: Vec<String> = redis::from_redis_value(
            &run(&store, redis::cmd("ZRANGE").arg("z").arg(0).arg(-1)).await.unwrap(),
        )
        .unwrap();
        assert_eq!(members, vec!["z", "a", "b"]);
    }

    #[tokio::test]
    async fn test_blpop_times_out_with_nil() {
        let store = MemoryStore::new();
        let reply = run(&store, redis::cmd("BLPOP").arg("empty").arg(0.05)).await.unwrap();
        assert_eq!(reply, Value::Nil);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemoryStore::new();
        store.fail_command("get", 1);
        let err = run(&store, redis::cmd("GET").arg("k")).await.unwrap_err();
        assert!(err.is_io_error());
        // Only one failure was queued
        assert!(run(&store, redis::cmd("GET").arg("k")).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let store = MemoryStore::new();
        assert!(run(&store, &redis::cmd("NOPE")).await.is_err());
    }
}
