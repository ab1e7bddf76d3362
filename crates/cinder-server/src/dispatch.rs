//! Command execution.
//!
//! Takes a typed [`Command`] plus the per-connection session state,
//! calls into the store or snapshot engine, and shapes the reply
//! frame. Engine errors arrive as typed values and leave as error
//! frames; nothing here panics on bad input.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use cinder_core::store::format_score;
use cinder_core::{StoreError, TtlResult};
use cinder_persistence::SnapshotError;
use cinder_protocol::{Command, Frame, SetExpire, SlowLogSub};

use crate::server::AppState;

/// Per-connection state: the selected database and auth status.
#[derive(Debug)]
pub struct Session {
    pub db: usize,
    pub authed: bool,
}

impl Session {
    pub fn new() -> Self {
        Self {
            db: 0,
            authed: false,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// What the connection loop should do after a command.
pub enum Outcome {
    /// Write this reply and keep reading commands.
    Reply(Frame),
    /// Write +OK, then switch the connection into monitor mode.
    Monitor,
}

/// Executes one command against the shared state.
pub fn execute(cmd: Command, state: &AppState, session: &mut Session) -> Outcome {
    // auth gate: with a password configured, only AUTH gets through
    let require_pass = state.config.read().require_pass.clone();
    if !require_pass.is_empty() && !session.authed {
        match &cmd {
            Command::Auth { .. } => {}
            _ => {
                return Outcome::Reply(Frame::Error("NOAUTH Authentication required.".into()));
            }
        }
    }

    match cmd {
        Command::Monitor => Outcome::Monitor,
        other => Outcome::Reply(reply(other, state, session, &require_pass)),
    }
}

fn reply(cmd: Command, state: &AppState, session: &mut Session, require_pass: &str) -> Frame {
    let db = session.db;
    let store = &state.store;

    match cmd {
        // -- connection --
        Command::Ping(None) => Frame::Simple("PONG".into()),
        Command::Ping(Some(msg)) => Frame::Bulk(msg),
        Command::Echo(msg) => Frame::Bulk(msg),
        Command::Auth { password } => {
            if require_pass.is_empty() {
                Frame::Error("ERR Client sent AUTH, but no password is set".into())
            } else if password == require_pass {
                session.authed = true;
                ok()
            } else {
                Frame::Error("ERR invalid password".into())
            }
        }
        Command::Select { index } => match store.select(index) {
            Ok(()) => {
                session.db = index;
                ok()
            }
            Err(e) => store_err(e),
        },

        // -- keys --
        Command::Del { keys } => {
            count_over_keys(&keys, |key| store.del(db, key).map(usize::from))
        }
        Command::Exists { keys } => {
            count_over_keys(&keys, |key| store.exists(db, key).map(usize::from))
        }
        Command::Type { key } => match store.key_type(db, &key) {
            Ok(Some(label)) => Frame::Simple(label.into()),
            Ok(None) => store_err(StoreError::NoSuchKey),
            Err(e) => store_err(e),
        },
        Command::Keys { pattern } => match store.keys(db, &pattern) {
            Ok(keys) => string_array(keys),
            Err(e) => store_err(e),
        },
        Command::Expire { key, seconds } => match store.expire(db, &key, seconds) {
            Ok(set) => Frame::Integer(i64::from(set)),
            Err(e) => store_err(e),
        },
        Command::Ttl { key } => match store.ttl(db, &key) {
            Ok(TtlResult::Seconds(secs)) => Frame::Integer(secs as i64),
            Ok(TtlResult::NoExpiry) => Frame::Integer(-1),
            Ok(TtlResult::NotFound) => Frame::Integer(-2),
            Err(e) => store_err(e),
        },
        Command::DbSize => match store.dbsize(db) {
            Ok(count) => Frame::Integer(count as i64),
            Err(e) => store_err(e),
        },
        Command::FlushDb => match store.flushdb(db) {
            Ok(()) => ok(),
            Err(e) => store_err(e),
        },
        Command::FlushAll => {
            store.flushall();
            ok()
        }

        // -- strings --
        Command::Set { key, value, expire } => {
            let ttl = expire.map(|e| match e {
                SetExpire::Ex(secs) => Duration::from_secs(secs),
                SetExpire::Px(millis) => Duration::from_millis(millis),
            });
            match store.set(db, &key, &value, ttl) {
                Ok(()) => ok(),
                Err(e) => store_err(e),
            }
        }
        Command::Get { key } => match store.get(db, &key) {
            Ok(Some(value)) => Frame::Bulk(value),
            Ok(None) => Frame::Null,
            Err(e) => store_err(e),
        },
        Command::Append { key, value } => int_result(store.append(db, &key, &value)),
        Command::GetRange { key, start, end } => match store.getrange(db, &key, start, end) {
            Ok(value) => Frame::Bulk(value),
            Err(e) => store_err(e),
        },
        Command::SetRange { key, offset, value } => {
            int_result(store.setrange(db, &key, offset, &value))
        }
        Command::StrLen { key } => int_result(store.strlen(db, &key)),

        // -- hashes --
        Command::HSet { key, fields } => int_result(store.hset(db, &key, &fields)),
        Command::HGet { key, field } => match store.hget(db, &key, &field) {
            Ok(Some(value)) => Frame::Bulk(value),
            Ok(None) => Frame::Null,
            Err(e) => store_err(e),
        },
        Command::HDel { key, fields } => int_result(store.hdel(db, &key, &fields)),
        Command::HLen { key } => int_result(store.hlen(db, &key)),
        Command::HExists { key, field } => match store.hexists(db, &key, &field) {
            Ok(exists) => Frame::Integer(i64::from(exists)),
            Err(e) => store_err(e),
        },
        Command::HKeys { key } => match store.hkeys(db, &key) {
            Ok(fields) => string_array(fields),
            Err(e) => store_err(e),
        },
        Command::HVals { key } => match store.hvals(db, &key) {
            Ok(values) => Frame::Array(values.into_iter().map(Frame::Bulk).collect()),
            Err(e) => store_err(e),
        },
        Command::HGetAll { key } => match store.hgetall(db, &key) {
            Ok(pairs) => {
                let mut items = Vec::with_capacity(pairs.len() * 2);
                for (field, value) in pairs {
                    items.push(Frame::bulk(field.into_bytes()));
                    items.push(Frame::Bulk(value));
                }
                Frame::Array(items)
            }
            Err(e) => store_err(e),
        },

        // -- lists --
        Command::LPush { key, values } => int_result(store.lpush(db, &key, &values)),
        Command::RPush { key, values } => int_result(store.rpush(db, &key, &values)),
        Command::LPop { key } => match store.lpop(db, &key) {
            Ok(Some(value)) => Frame::Bulk(value),
            Ok(None) => Frame::Null,
            Err(e) => store_err(e),
        },
        Command::RPop { key } => match store.rpop(db, &key) {
            Ok(Some(value)) => Frame::Bulk(value),
            Ok(None) => Frame::Null,
            Err(e) => store_err(e),
        },
        Command::LLen { key } => int_result(store.llen(db, &key)),
        Command::LRange { key, start, stop } => match store.lrange(db, &key, start, stop) {
            Ok(items) => Frame::Array(items.into_iter().map(Frame::Bulk).collect()),
            Err(e) => store_err(e),
        },
        Command::LIndex { key, index } => match store.lindex(db, &key, index) {
            Ok(Some(value)) => Frame::Bulk(value),
            Ok(None) => Frame::Null,
            Err(e) => store_err(e),
        },
        Command::LSet { key, index, value } => match store.lset(db, &key, index, &value) {
            Ok(()) => ok(),
            Err(e) => store_err(e),
        },

        // -- sets --
        Command::SAdd { key, members } => int_result(store.sadd(db, &key, &members)),
        Command::SRem { key, members } => int_result(store.srem(db, &key, &members)),
        Command::SMembers { key } => match store.smembers(db, &key) {
            Ok(members) => string_array(members),
            Err(e) => store_err(e),
        },
        Command::SCard { key } => int_result(store.scard(db, &key)),
        Command::SIsMember { key, member } => match store.sismember(db, &key, &member) {
            Ok(is_member) => Frame::Integer(i64::from(is_member)),
            Err(e) => store_err(e),
        },
        Command::SUnion { keys } => match store.sunion(db, &keys) {
            Ok(members) => string_array(members),
            Err(e) => store_err(e),
        },
        Command::SInter { keys } => match store.sinter(db, &keys) {
            Ok(members) => string_array(members),
            Err(e) => store_err(e),
        },
        Command::SDiff { keys } => match store.sdiff(db, &keys) {
            Ok(members) => string_array(members),
            Err(e) => store_err(e),
        },

        // -- sorted sets --
        Command::ZAdd { key, pairs } => int_result(store.zadd(db, &key, &pairs)),
        Command::ZScore { key, member } => match store.zscore(db, &key, &member) {
            Ok(Some(score)) => Frame::bulk(format_score(score).into_bytes()),
            Ok(None) => Frame::Null,
            Err(e) => store_err(e),
        },
        Command::ZRem { key, members } => int_result(store.zrem(db, &key, &members)),
        Command::ZCard { key } => int_result(store.zcard(db, &key)),
        Command::ZIncrBy { key, delta, member } => {
            match store.zincrby(db, &key, delta, &member) {
                Ok(score) => Frame::bulk(format_score(score).into_bytes()),
                Err(e) => store_err(e),
            }
        }
        Command::ZRange {
            key,
            start,
            stop,
            with_scores,
        } => match store.zrange(db, &key, start, stop) {
            Ok(pairs) => scored_array(pairs, with_scores),
            Err(e) => store_err(e),
        },
        Command::ZRangeByScore {
            key,
            min,
            max,
            with_scores,
        } => match store.zrange_by_score(db, &key, min, max) {
            Ok(pairs) => scored_array(pairs, with_scores),
            Err(e) => store_err(e),
        },

        // -- server --
        Command::Save => match state.snapshotter.save() {
            Ok(_) => ok(),
            Err(e) => snapshot_err(e),
        },
        Command::BgSave => match state.snapshotter.background_save() {
            Ok(()) => Frame::Simple("Background saving started".into()),
            Err(e) => snapshot_err(e),
        },
        Command::LastSave => Frame::Integer(state.snapshotter.last_save_unix() as i64),
        Command::Info => Frame::bulk(info_text(state).into_bytes()),
        Command::Time => {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default();
            Frame::Array(vec![
                Frame::bulk(now.as_secs().to_string().into_bytes()),
                Frame::bulk(now.subsec_micros().to_string().into_bytes()),
            ])
        }
        Command::ConfigGet { parameter } => config_get(state, &parameter),
        Command::SlowLog(sub) => slowlog_reply(state, sub),

        Command::Monitor => unreachable!("handled by execute"),
        Command::Unknown(name) => Frame::Error(format!("ERR unknown command '{name}'")),
    }
}

fn ok() -> Frame {
    Frame::Simple("OK".into())
}

fn store_err(e: StoreError) -> Frame {
    Frame::Error(e.to_string())
}

fn snapshot_err(e: SnapshotError) -> Frame {
    match e {
        SnapshotError::SaveInProgress => Frame::Error(e.to_string()),
        other => Frame::Error(format!("ERR {other}")),
    }
}

fn int_result(result: Result<usize, StoreError>) -> Frame {
    match result {
        Ok(n) => Frame::Integer(n as i64),
        Err(e) => store_err(e),
    }
}

fn count_over_keys(
    keys: &[String],
    mut op: impl FnMut(&str) -> Result<usize, StoreError>,
) -> Frame {
    let mut total = 0;
    for key in keys {
        match op(key) {
            Ok(n) => total += n,
            Err(e) => return store_err(e),
        }
    }
    Frame::Integer(total as i64)
}

fn string_array(items: Vec<String>) -> Frame {
    Frame::Array(
        items
            .into_iter()
            .map(|s| Frame::bulk(s.into_bytes()))
            .collect(),
    )
}

fn scored_array(pairs: Vec<(String, f64)>, with_scores: bool) -> Frame {
    let mut items = Vec::with_capacity(if with_scores {
        pairs.len() * 2
    } else {
        pairs.len()
    });
    for (member, score) in pairs {
        items.push(Frame::bulk(member.into_bytes()));
        if with_scores {
            items.push(Frame::bulk(format_score(score).into_bytes()));
        }
    }
    Frame::Array(items)
}

fn info_text(state: &AppState) -> String {
    let config = state.config.read();
    let mut out = String::new();

    out.push_str("# Server\r\n");
    out.push_str(&format!("cinder_version:{}\r\n", env!("CARGO_PKG_VERSION")));
    out.push_str(&format!("mode:{}\r\n", config.mode));
    out.push_str(&format!(
        "uptime_in_seconds:{}\r\n",
        state.started_at.elapsed().as_secs()
    ));
    out.push_str(&format!("tcp_port:{}\r\n", config.port));

    out.push_str("\r\n# Clients\r\n");
    out.push_str(&format!(
        "connected_clients:{}\r\n",
        state.clients.load(std::sync::atomic::Ordering::SeqCst)
    ));

    out.push_str("\r\n# Persistence\r\n");
    out.push_str(&format!(
        "rdb_last_save_time:{}\r\n",
        state.snapshotter.last_save_unix()
    ));
    out.push_str(&format!(
        "rdb_dirty_keys:{}\r\n",
        state.store.dirty_len()
    ));

    out.push_str("\r\n# Keyspace\r\n");
    for db in 0..state.store.database_count() {
        if let Ok(count) = state.store.dbsize(db) {
            if count > 0 {
                out.push_str(&format!("db{db}:keys={count}\r\n"));
            }
        }
    }
    out
}

fn config_get(state: &AppState, parameter: &str) -> Frame {
    let config = state.config.read();
    let value = match parameter.to_ascii_lowercase().as_str() {
        "mode" => Some(config.mode.clone()),
        "bind" => Some(config.bind.clone()),
        "port" => Some(config.port.to_string()),
        "databases" => Some(config.databases.to_string()),
        "max_clients" => Some(config.max_clients.to_string()),
        "append_only" => Some(config.append_only.to_string()),
        "append_filename" => Some(config.append_filename.clone()),
        "require_pass" => Some(config.require_pass.clone()),
        "log_level" => Some(config.log_level.clone()),
        "log_path" => Some(config.log_path.clone()),
        "rdb.filename" => Some(config.rdb.filename.clone()),
        "rdb.save_interval" => Some(config.rdb.save_interval.clone()),
        "rdb.compression_level" => Some(config.rdb.compression_level.to_string()),
        "rdb.auto_save_changes" => Some(config.rdb.auto_save_changes.to_string()),
        _ => None,
    };
    match value {
        Some(value) => Frame::Array(vec![
            Frame::bulk(parameter.to_owned().into_bytes()),
            Frame::bulk(value.into_bytes()),
        ]),
        None => Frame::Array(vec![]),
    }
}

fn slowlog_reply(state: &AppState, sub: SlowLogSub) -> Frame {
    match sub {
        SlowLogSub::Len => Frame::Integer(state.slowlog.len() as i64),
        SlowLogSub::Reset => {
            state.slowlog.reset();
            ok()
        }
        SlowLogSub::Get(count) => {
            let entries = state.slowlog.get(count);
            Frame::Array(
                entries
                    .into_iter()
                    .map(|entry| {
                        Frame::Array(vec![
                            Frame::Integer(entry.id as i64),
                            Frame::Integer(entry.unix_secs as i64),
                            Frame::Integer(entry.duration_us as i64),
                            Frame::Bulk(Bytes::from(entry.command.into_bytes())),
                        ])
                    })
                    .collect(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::server::AppState;

    fn state() -> AppState {
        AppState::for_tests(Config::default())
    }

    fn run(state: &AppState, session: &mut Session, tokens: &[&str]) -> Frame {
        let cmd = Command::from_frame(Frame::command(tokens)).unwrap();
        match execute(cmd, state, session) {
            Outcome::Reply(frame) => frame,
            Outcome::Monitor => panic!("unexpected monitor switch"),
        }
    }

    #[test]
    fn ping_and_echo() {
        let state = state();
        let mut session = Session::new();
        assert_eq!(run(&state, &mut session, &["PING"]), Frame::Simple("PONG".into()));
        assert_eq!(
            run(&state, &mut session, &["ECHO", "hi"]),
            Frame::Bulk(Bytes::from_static(b"hi"))
        );
    }

    #[test]
    fn set_get_append_scenario() {
        let state = state();
        let mut session = Session::new();

        assert_eq!(run(&state, &mut session, &["SET", "x", "hi"]), ok());
        assert_eq!(
            run(&state, &mut session, &["GET", "x"]),
            Frame::Bulk(Bytes::from_static(b"hi"))
        );
        assert_eq!(
            run(&state, &mut session, &["APPEND", "x", "!"]),
            Frame::Integer(3)
        );
        assert_eq!(
            run(&state, &mut session, &["GET", "x"]),
            Frame::Bulk(Bytes::from_static(b"hi!"))
        );
    }

    #[test]
    fn select_switches_database() {
        let state = state();
        let mut session = Session::new();

        run(&state, &mut session, &["SET", "k", "zero"]);
        assert_eq!(run(&state, &mut session, &["SELECT", "1"]), ok());
        assert_eq!(session.db, 1);
        assert_eq!(run(&state, &mut session, &["GET", "k"]), Frame::Null);

        assert!(matches!(
            run(&state, &mut session, &["SELECT", "99"]),
            Frame::Error(_)
        ));
        // failed select leaves the session where it was
        assert_eq!(session.db, 1);
    }

    #[test]
    fn wrong_type_surfaces_as_error() {
        let state = state();
        let mut session = Session::new();
        run(&state, &mut session, &["LPUSH", "q", "a"]);
        let Frame::Error(msg) = run(&state, &mut session, &["GET", "q"]) else {
            panic!("expected error");
        };
        assert!(msg.starts_with("WRONGTYPE"));
    }

    #[test]
    fn unknown_command_names_the_verb() {
        let state = state();
        let mut session = Session::new();
        assert_eq!(
            run(&state, &mut session, &["NOPE"]),
            Frame::Error("ERR unknown command 'NOPE'".into())
        );
    }

    #[test]
    fn type_of_missing_key_is_an_error() {
        let state = state();
        let mut session = Session::new();
        run(&state, &mut session, &["SET", "s", "v"]);
        assert_eq!(
            run(&state, &mut session, &["TYPE", "s"]),
            Frame::Simple("string".into())
        );
        assert_eq!(
            run(&state, &mut session, &["TYPE", "missing"]),
            Frame::Error("ERR no such key".into())
        );
    }

    #[test]
    fn del_and_exists_count_over_keys() {
        let state = state();
        let mut session = Session::new();
        run(&state, &mut session, &["SET", "a", "1"]);
        run(&state, &mut session, &["SET", "b", "2"]);

        assert_eq!(
            run(&state, &mut session, &["EXISTS", "a", "b", "ghost"]),
            Frame::Integer(2)
        );
        assert_eq!(
            run(&state, &mut session, &["DEL", "a", "b", "ghost"]),
            Frame::Integer(2)
        );
        assert_eq!(
            run(&state, &mut session, &["DEL", "a"]),
            Frame::Integer(0)
        );
    }

    #[test]
    fn zrange_with_scores_interleaves() {
        let state = state();
        let mut session = Session::new();
        run(&state, &mut session, &["ZADD", "z", "1", "a", "2", "b"]);

        assert_eq!(
            run(&state, &mut session, &["ZRANGE", "z", "0", "-1"]),
            Frame::Array(vec![
                Frame::Bulk(Bytes::from_static(b"a")),
                Frame::Bulk(Bytes::from_static(b"b")),
            ])
        );
        assert_eq!(
            run(&state, &mut session, &["ZRANGE", "z", "0", "-1", "WITHSCORES"]),
            Frame::Array(vec![
                Frame::Bulk(Bytes::from_static(b"a")),
                Frame::Bulk(Bytes::from_static(b"1")),
                Frame::Bulk(Bytes::from_static(b"b")),
                Frame::Bulk(Bytes::from_static(b"2")),
            ])
        );
    }

    #[test]
    fn zincrby_formats_like_redis() {
        let state = state();
        let mut session = Session::new();
        run(&state, &mut session, &["ZADD", "z", "1", "a"]);
        assert_eq!(
            run(&state, &mut session, &["ZINCRBY", "z", "10", "a"]),
            Frame::Bulk(Bytes::from_static(b"11"))
        );
        assert_eq!(
            run(&state, &mut session, &["ZSCORE", "z", "a"]),
            Frame::Bulk(Bytes::from_static(b"11"))
        );
    }

    #[test]
    fn auth_gate_blocks_until_authenticated() {
        let mut config = Config::default();
        config.require_pass = "sekrit".into();
        let state = AppState::for_tests(config);
        let mut session = Session::new();

        assert!(matches!(
            run(&state, &mut session, &["GET", "k"]),
            Frame::Error(msg) if msg.starts_with("NOAUTH")
        ));
        assert!(matches!(
            run(&state, &mut session, &["AUTH", "wrong"]),
            Frame::Error(msg) if msg.contains("invalid password")
        ));
        assert_eq!(run(&state, &mut session, &["AUTH", "sekrit"]), ok());
        assert_eq!(run(&state, &mut session, &["GET", "k"]), Frame::Null);
    }

    #[test]
    fn auth_without_password_configured() {
        let state = state();
        let mut session = Session::new();
        assert!(matches!(
            run(&state, &mut session, &["AUTH", "x"]),
            Frame::Error(msg) if msg.contains("no password is set")
        ));
    }

    #[test]
    fn config_get_known_and_unknown() {
        let state = state();
        let mut session = Session::new();
        assert_eq!(
            run(&state, &mut session, &["CONFIG", "GET", "port"]),
            Frame::Array(vec![
                Frame::Bulk(Bytes::from_static(b"port")),
                Frame::Bulk(Bytes::from_static(b"6379")),
            ])
        );
        assert_eq!(
            run(&state, &mut session, &["CONFIG", "GET", "bogus"]),
            Frame::Array(vec![])
        );
    }

    #[test]
    fn dbsize_counts_current_database() {
        let state = state();
        let mut session = Session::new();
        run(&state, &mut session, &["SET", "a", "1"]);
        run(&state, &mut session, &["SET", "b", "2"]);
        assert_eq!(run(&state, &mut session, &["DBSIZE"]), Frame::Integer(2));

        run(&state, &mut session, &["SELECT", "5"]);
        assert_eq!(run(&state, &mut session, &["DBSIZE"]), Frame::Integer(0));
    }

    #[test]
    fn flushdb_and_flushall() {
        let state = state();
        let mut session = Session::new();
        run(&state, &mut session, &["SET", "a", "1"]);
        run(&state, &mut session, &["SELECT", "1"]);
        run(&state, &mut session, &["SET", "b", "2"]);

        assert_eq!(run(&state, &mut session, &["FLUSHDB"]), ok());
        assert_eq!(run(&state, &mut session, &["DBSIZE"]), Frame::Integer(0));
        run(&state, &mut session, &["SELECT", "0"]);
        assert_eq!(run(&state, &mut session, &["DBSIZE"]), Frame::Integer(1));

        assert_eq!(run(&state, &mut session, &["FLUSHALL"]), ok());
        assert_eq!(run(&state, &mut session, &["DBSIZE"]), Frame::Integer(0));
    }

    #[test]
    fn info_contains_keyspace_section() {
        let state = state();
        let mut session = Session::new();
        run(&state, &mut session, &["SET", "a", "1"]);

        let Frame::Bulk(text) = run(&state, &mut session, &["INFO"]) else {
            panic!("expected bulk");
        };
        let text = String::from_utf8(text.to_vec()).unwrap();
        assert!(text.contains("# Server"));
        assert!(text.contains("db0:keys=1"));
    }

    #[test]
    fn slowlog_starts_empty() {
        let state = state();
        let mut session = Session::new();
        assert_eq!(
            run(&state, &mut session, &["SLOWLOG", "LEN"]),
            Frame::Integer(0)
        );
        assert_eq!(
            run(&state, &mut session, &["SLOWLOG", "GET"]),
            Frame::Array(vec![])
        );
        assert_eq!(run(&state, &mut session, &["SLOWLOG", "RESET"]), ok());
    }
}
