//! Command parsing from wire frames.
//!
//! Converts a parsed [`Frame`] (expected to be an array of bulk
//! strings) into a typed [`Command`]. Argument count bounds and
//! integer/float coercions are enforced here, so the dispatcher only
//! ever sees well-formed commands. Unknown verbs are preserved for
//! the dispatcher's `unknown command` reply.

use bytes::Bytes;

use crate::error::ProtocolError;
use crate::types::Frame;

/// Expiration option for SET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetExpire {
    /// EX seconds.
    Ex(u64),
    /// PX milliseconds.
    Px(u64),
}

/// SLOWLOG subcommands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlowLogSub {
    Get(Option<usize>),
    Reset,
    Len,
}

/// A parsed client command, ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // -- connection --
    Ping(Option<Bytes>),
    Echo(Bytes),
    Auth { password: String },
    Select { index: usize },

    // -- keys --
    Del { keys: Vec<String> },
    Exists { keys: Vec<String> },
    Type { key: String },
    Keys { pattern: String },
    Expire { key: String, seconds: i64 },
    Ttl { key: String },
    DbSize,
    FlushDb,
    FlushAll,

    // -- strings --
    Set { key: String, value: Bytes, expire: Option<SetExpire> },
    Get { key: String },
    Append { key: String, value: Bytes },
    GetRange { key: String, start: i64, end: i64 },
    SetRange { key: String, offset: usize, value: Bytes },
    StrLen { key: String },

    // -- hashes --
    HSet { key: String, fields: Vec<(String, Bytes)> },
    HGet { key: String, field: String },
    HDel { key: String, fields: Vec<String> },
    HLen { key: String },
    HExists { key: String, field: String },
    HKeys { key: String },
    HVals { key: String },
    HGetAll { key: String },

    // -- lists --
    LPush { key: String, values: Vec<Bytes> },
    RPush { key: String, values: Vec<Bytes> },
    LPop { key: String },
    RPop { key: String },
    LLen { key: String },
    LRange { key: String, start: i64, stop: i64 },
    LIndex { key: String, index: i64 },
    LSet { key: String, index: i64, value: Bytes },

    // -- sets --
    SAdd { key: String, members: Vec<String> },
    SRem { key: String, members: Vec<String> },
    SMembers { key: String },
    SCard { key: String },
    SIsMember { key: String, member: String },
    SUnion { keys: Vec<String> },
    SInter { keys: Vec<String> },
    SDiff { keys: Vec<String> },

    // -- sorted sets --
    ZAdd { key: String, pairs: Vec<(f64, String)> },
    ZScore { key: String, member: String },
    ZRem { key: String, members: Vec<String> },
    ZCard { key: String },
    ZIncrBy { key: String, delta: f64, member: String },
    ZRange { key: String, start: i64, stop: i64, with_scores: bool },
    ZRangeByScore { key: String, min: f64, max: f64, with_scores: bool },

    // -- server --
    Save,
    BgSave,
    LastSave,
    Info,
    Time,
    ConfigGet { parameter: String },
    SlowLog(SlowLogSub),
    Monitor,

    /// A verb we don't recognize.
    Unknown(String),
}

impl Command {
    /// Parses a [`Frame`] into a [`Command`].
    ///
    /// Expects an array frame where the first element is the verb and
    /// the rest are arguments.
    pub fn from_frame(frame: Frame) -> Result<Command, ProtocolError> {
        let frames = match frame {
            Frame::Array(frames) => frames,
            _ => {
                return Err(ProtocolError::InvalidCommandFrame(
                    "expected array frame".into(),
                ));
            }
        };

        if frames.is_empty() {
            return Err(ProtocolError::InvalidCommandFrame(
                "empty command array".into(),
            ));
        }

        let name = extract_string(&frames[0])?;
        let args = &frames[1..];

        match name.to_ascii_uppercase().as_str() {
            "PING" => parse_ping(args),
            "ECHO" => Ok(Command::Echo(exactly_one_bytes(args, "echo")?)),
            "AUTH" => Ok(Command::Auth {
                password: exactly_one_string(args, "auth")?,
            }),
            "SELECT" => parse_select(args),
            "DEL" => Ok(Command::Del {
                keys: at_least_one_strings(args, "del")?,
            }),
            "EXISTS" => Ok(Command::Exists {
                keys: at_least_one_strings(args, "exists")?,
            }),
            "TYPE" => Ok(Command::Type {
                key: exactly_one_string(args, "type")?,
            }),
            "KEYS" => Ok(Command::Keys {
                pattern: exactly_one_string(args, "keys")?,
            }),
            "EXPIRE" => parse_expire(args),
            "TTL" => Ok(Command::Ttl {
                key: exactly_one_string(args, "ttl")?,
            }),
            "DBSIZE" => no_args(args, "dbsize", Command::DbSize),
            "FLUSHDB" => no_args(args, "flushdb", Command::FlushDb),
            "FLUSHALL" => no_args(args, "flushall", Command::FlushAll),
            "SET" => parse_set(args),
            "GET" => Ok(Command::Get {
                key: exactly_one_string(args, "get")?,
            }),
            "APPEND" => parse_append(args),
            "GETRANGE" => parse_getrange(args),
            "SETRANGE" => parse_setrange(args),
            "STRLEN" => Ok(Command::StrLen {
                key: exactly_one_string(args, "strlen")?,
            }),
            "HSET" => parse_hset(args),
            "HGET" => parse_hget(args),
            "HDEL" => parse_hdel(args),
            "HLEN" => Ok(Command::HLen {
                key: exactly_one_string(args, "hlen")?,
            }),
            "HEXISTS" => parse_hexists(args),
            "HKEYS" => Ok(Command::HKeys {
                key: exactly_one_string(args, "hkeys")?,
            }),
            "HVALS" => Ok(Command::HVals {
                key: exactly_one_string(args, "hvals")?,
            }),
            "HGETALL" => Ok(Command::HGetAll {
                key: exactly_one_string(args, "hgetall")?,
            }),
            "LPUSH" => parse_push(args, "lpush", true),
            "RPUSH" => parse_push(args, "rpush", false),
            "LPOP" => Ok(Command::LPop {
                key: exactly_one_string(args, "lpop")?,
            }),
            "RPOP" => Ok(Command::RPop {
                key: exactly_one_string(args, "rpop")?,
            }),
            "LLEN" => Ok(Command::LLen {
                key: exactly_one_string(args, "llen")?,
            }),
            "LRANGE" => parse_lrange(args),
            "LINDEX" => parse_lindex(args),
            "LSET" => parse_lset(args),
            "SADD" => parse_members(args, "sadd", |key, members| Command::SAdd { key, members }),
            "SREM" => parse_members(args, "srem", |key, members| Command::SRem { key, members }),
            "SMEMBERS" => Ok(Command::SMembers {
                key: exactly_one_string(args, "smembers")?,
            }),
            "SCARD" => Ok(Command::SCard {
                key: exactly_one_string(args, "scard")?,
            }),
            "SISMEMBER" => parse_sismember(args),
            "SUNION" => Ok(Command::SUnion {
                keys: at_least_one_strings(args, "sunion")?,
            }),
            "SINTER" => Ok(Command::SInter {
                keys: at_least_one_strings(args, "sinter")?,
            }),
            "SDIFF" => Ok(Command::SDiff {
                keys: at_least_one_strings(args, "sdiff")?,
            }),
            "ZADD" => parse_zadd(args),
            "ZSCORE" => parse_zscore(args),
            "ZREM" => parse_members(args, "zrem", |key, members| Command::ZRem { key, members }),
            "ZCARD" => Ok(Command::ZCard {
                key: exactly_one_string(args, "zcard")?,
            }),
            "ZINCRBY" => parse_zincrby(args),
            "ZRANGE" => parse_zrange(args),
            "ZRANGEBYSCORE" => parse_zrangebyscore(args),
            "SAVE" => no_args(args, "save", Command::Save),
            "BGSAVE" => no_args(args, "bgsave", Command::BgSave),
            "LASTSAVE" => no_args(args, "lastsave", Command::LastSave),
            "INFO" => Ok(Command::Info),
            "TIME" => no_args(args, "time", Command::Time),
            "CONFIG" => parse_config(args),
            "SLOWLOG" => parse_slowlog(args),
            "MONITOR" => no_args(args, "monitor", Command::Monitor),
            _ => Ok(Command::Unknown(name)),
        }
    }
}

// ---------------------------------------------------------------------------
// argument extraction helpers
// ---------------------------------------------------------------------------

/// Extracts a UTF-8 string from a bulk or simple frame.
fn extract_string(frame: &Frame) -> Result<String, ProtocolError> {
    match frame {
        Frame::Bulk(data) => String::from_utf8(data.to_vec())
            .map_err(|_| ProtocolError::InvalidCommandFrame("argument is not valid utf-8".into())),
        Frame::Simple(s) => Ok(s.clone()),
        _ => Err(ProtocolError::InvalidCommandFrame(
            "expected bulk or simple string argument".into(),
        )),
    }
}

/// Extracts raw bytes from a bulk or simple frame.
fn extract_bytes(frame: &Frame) -> Result<Bytes, ProtocolError> {
    match frame {
        Frame::Bulk(data) => Ok(data.clone()),
        Frame::Simple(s) => Ok(Bytes::from(s.clone().into_bytes())),
        _ => Err(ProtocolError::InvalidCommandFrame(
            "expected bulk or simple string argument".into(),
        )),
    }
}

fn parse_i64(frame: &Frame) -> Result<i64, ProtocolError> {
    extract_string(frame)?
        .parse()
        .map_err(|_| ProtocolError::NotInteger)
}

fn parse_u64(frame: &Frame) -> Result<u64, ProtocolError> {
    extract_string(frame)?
        .parse()
        .map_err(|_| ProtocolError::NotInteger)
}

/// Parses a float score. `inf`/`-inf`/`+inf` are accepted; NaN is not
/// a valid score.
fn parse_f64(frame: &Frame) -> Result<f64, ProtocolError> {
    let text = extract_string(frame)?;
    let value: f64 = match text.to_ascii_lowercase().as_str() {
        "inf" | "+inf" => f64::INFINITY,
        "-inf" => f64::NEG_INFINITY,
        other => other.parse().map_err(|_| ProtocolError::NotFloat)?,
    };
    if value.is_nan() {
        return Err(ProtocolError::NotFloat);
    }
    Ok(value)
}

fn exactly_one_string(args: &[Frame], cmd: &str) -> Result<String, ProtocolError> {
    if args.len() != 1 {
        return Err(ProtocolError::WrongArity(cmd.into()));
    }
    extract_string(&args[0])
}

fn exactly_one_bytes(args: &[Frame], cmd: &str) -> Result<Bytes, ProtocolError> {
    if args.len() != 1 {
        return Err(ProtocolError::WrongArity(cmd.into()));
    }
    extract_bytes(&args[0])
}

fn at_least_one_strings(args: &[Frame], cmd: &str) -> Result<Vec<String>, ProtocolError> {
    if args.is_empty() {
        return Err(ProtocolError::WrongArity(cmd.into()));
    }
    args.iter().map(extract_string).collect()
}

fn no_args(args: &[Frame], cmd: &str, command: Command) -> Result<Command, ProtocolError> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(ProtocolError::WrongArity(cmd.into()))
    }
}

// ---------------------------------------------------------------------------
// per-command parsers
// ---------------------------------------------------------------------------

fn parse_ping(args: &[Frame]) -> Result<Command, ProtocolError> {
    match args.len() {
        0 => Ok(Command::Ping(None)),
        1 => Ok(Command::Ping(Some(extract_bytes(&args[0])?))),
        _ => Err(ProtocolError::WrongArity("ping".into())),
    }
}

fn parse_select(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 1 {
        return Err(ProtocolError::WrongArity("select".into()));
    }
    let index = parse_i64(&args[0])?;
    if index < 0 {
        return Err(ProtocolError::NotInteger);
    }
    Ok(Command::Select {
        index: index as usize,
    })
}

fn parse_expire(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 2 {
        return Err(ProtocolError::WrongArity("expire".into()));
    }
    Ok(Command::Expire {
        key: extract_string(&args[0])?,
        seconds: parse_i64(&args[1])?,
    })
}

fn parse_set(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() < 2 {
        return Err(ProtocolError::WrongArity("set".into()));
    }
    let key = extract_string(&args[0])?;
    let value = extract_bytes(&args[1])?;

    let expire = match args.len() {
        2 => None,
        4 => {
            let flag = extract_string(&args[2])?.to_ascii_uppercase();
            let amount = parse_u64(&args[3])?;
            if amount == 0 {
                return Err(ProtocolError::InvalidCommandFrame(
                    "invalid expire time in 'set' command".into(),
                ));
            }
            match flag.as_str() {
                "EX" => Some(SetExpire::Ex(amount)),
                "PX" => Some(SetExpire::Px(amount)),
                _ => return Err(ProtocolError::Syntax),
            }
        }
        _ => return Err(ProtocolError::Syntax),
    };

    Ok(Command::Set { key, value, expire })
}

fn parse_append(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 2 {
        return Err(ProtocolError::WrongArity("append".into()));
    }
    Ok(Command::Append {
        key: extract_string(&args[0])?,
        value: extract_bytes(&args[1])?,
    })
}

fn parse_getrange(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 3 {
        return Err(ProtocolError::WrongArity("getrange".into()));
    }
    Ok(Command::GetRange {
        key: extract_string(&args[0])?,
        start: parse_i64(&args[1])?,
        end: parse_i64(&args[2])?,
    })
}

fn parse_setrange(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 3 {
        return Err(ProtocolError::WrongArity("setrange".into()));
    }
    let offset = parse_i64(&args[1])?;
    if offset < 0 {
        return Err(ProtocolError::InvalidCommandFrame(
            "offset is out of range".into(),
        ));
    }
    Ok(Command::SetRange {
        key: extract_string(&args[0])?,
        offset: offset as usize,
        value: extract_bytes(&args[2])?,
    })
}

fn parse_hset(args: &[Frame]) -> Result<Command, ProtocolError> {
    // key plus at least one field/value pair, in pairs
    if args.len() < 3 || args.len() % 2 == 0 {
        return Err(ProtocolError::WrongArity("hset".into()));
    }
    let key = extract_string(&args[0])?;
    let mut fields = Vec::with_capacity((args.len() - 1) / 2);
    for pair in args[1..].chunks_exact(2) {
        fields.push((extract_string(&pair[0])?, extract_bytes(&pair[1])?));
    }
    Ok(Command::HSet { key, fields })
}

fn parse_hget(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 2 {
        return Err(ProtocolError::WrongArity("hget".into()));
    }
    Ok(Command::HGet {
        key: extract_string(&args[0])?,
        field: extract_string(&args[1])?,
    })
}

fn parse_hdel(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() < 2 {
        return Err(ProtocolError::WrongArity("hdel".into()));
    }
    Ok(Command::HDel {
        key: extract_string(&args[0])?,
        fields: args[1..].iter().map(extract_string).collect::<Result<_, _>>()?,
    })
}

fn parse_hexists(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 2 {
        return Err(ProtocolError::WrongArity("hexists".into()));
    }
    Ok(Command::HExists {
        key: extract_string(&args[0])?,
        field: extract_string(&args[1])?,
    })
}

fn parse_push(args: &[Frame], cmd: &str, left: bool) -> Result<Command, ProtocolError> {
    if args.len() < 2 {
        return Err(ProtocolError::WrongArity(cmd.into()));
    }
    let key = extract_string(&args[0])?;
    let values = args[1..].iter().map(extract_bytes).collect::<Result<_, _>>()?;
    Ok(if left {
        Command::LPush { key, values }
    } else {
        Command::RPush { key, values }
    })
}

fn parse_lrange(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 3 {
        return Err(ProtocolError::WrongArity("lrange".into()));
    }
    Ok(Command::LRange {
        key: extract_string(&args[0])?,
        start: parse_i64(&args[1])?,
        stop: parse_i64(&args[2])?,
    })
}

fn parse_lindex(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 2 {
        return Err(ProtocolError::WrongArity("lindex".into()));
    }
    Ok(Command::LIndex {
        key: extract_string(&args[0])?,
        index: parse_i64(&args[1])?,
    })
}

fn parse_lset(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 3 {
        return Err(ProtocolError::WrongArity("lset".into()));
    }
    Ok(Command::LSet {
        key: extract_string(&args[0])?,
        index: parse_i64(&args[1])?,
        value: extract_bytes(&args[2])?,
    })
}

fn parse_members(
    args: &[Frame],
    cmd: &str,
    build: fn(String, Vec<String>) -> Command,
) -> Result<Command, ProtocolError> {
    if args.len() < 2 {
        return Err(ProtocolError::WrongArity(cmd.into()));
    }
    let key = extract_string(&args[0])?;
    let members = args[1..].iter().map(extract_string).collect::<Result<_, _>>()?;
    Ok(build(key, members))
}

fn parse_sismember(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 2 {
        return Err(ProtocolError::WrongArity("sismember".into()));
    }
    Ok(Command::SIsMember {
        key: extract_string(&args[0])?,
        member: extract_string(&args[1])?,
    })
}

fn parse_zadd(args: &[Frame]) -> Result<Command, ProtocolError> {
    // key plus at least one score/member pair, in pairs
    if args.len() < 3 || args.len() % 2 == 0 {
        return Err(ProtocolError::WrongArity("zadd".into()));
    }
    let key = extract_string(&args[0])?;
    let mut pairs = Vec::with_capacity((args.len() - 1) / 2);
    for pair in args[1..].chunks_exact(2) {
        pairs.push((parse_f64(&pair[0])?, extract_string(&pair[1])?));
    }
    Ok(Command::ZAdd { key, pairs })
}

fn parse_zscore(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 2 {
        return Err(ProtocolError::WrongArity("zscore".into()));
    }
    Ok(Command::ZScore {
        key: extract_string(&args[0])?,
        member: extract_string(&args[1])?,
    })
}

fn parse_zincrby(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 3 {
        return Err(ProtocolError::WrongArity("zincrby".into()));
    }
    Ok(Command::ZIncrBy {
        key: extract_string(&args[0])?,
        delta: parse_f64(&args[1])?,
        member: extract_string(&args[2])?,
    })
}

fn parse_zrange(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() < 3 || args.len() > 4 {
        return Err(ProtocolError::WrongArity("zrange".into()));
    }
    let with_scores = parse_withscores(args.get(3))?;
    Ok(Command::ZRange {
        key: extract_string(&args[0])?,
        start: parse_i64(&args[1])?,
        stop: parse_i64(&args[2])?,
        with_scores,
    })
}

fn parse_zrangebyscore(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() < 3 || args.len() > 4 {
        return Err(ProtocolError::WrongArity("zrangebyscore".into()));
    }
    let with_scores = parse_withscores(args.get(3))?;
    Ok(Command::ZRangeByScore {
        key: extract_string(&args[0])?,
        min: parse_f64(&args[1])?,
        max: parse_f64(&args[2])?,
        with_scores,
    })
}

fn parse_withscores(arg: Option<&Frame>) -> Result<bool, ProtocolError> {
    match arg {
        None => Ok(false),
        Some(frame) => {
            if extract_string(frame)?.eq_ignore_ascii_case("WITHSCORES") {
                Ok(true)
            } else {
                Err(ProtocolError::Syntax)
            }
        }
    }
}

fn parse_config(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 2 {
        return Err(ProtocolError::WrongArity("config".into()));
    }
    let sub = extract_string(&args[0])?;
    if !sub.eq_ignore_ascii_case("GET") {
        return Err(ProtocolError::Syntax);
    }
    Ok(Command::ConfigGet {
        parameter: extract_string(&args[1])?,
    })
}

fn parse_slowlog(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.is_empty() {
        return Err(ProtocolError::WrongArity("slowlog".into()));
    }
    let sub = extract_string(&args[0])?.to_ascii_uppercase();
    match (sub.as_str(), args.len()) {
        ("GET", 1) => Ok(Command::SlowLog(SlowLogSub::Get(None))),
        ("GET", 2) => {
            let count = parse_i64(&args[1])?;
            if count < 0 {
                return Err(ProtocolError::NotInteger);
            }
            Ok(Command::SlowLog(SlowLogSub::Get(Some(count as usize))))
        }
        ("RESET", 1) => Ok(Command::SlowLog(SlowLogSub::Reset)),
        ("LEN", 1) => Ok(Command::SlowLog(SlowLogSub::Len)),
        _ => Err(ProtocolError::Syntax),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(tokens: &[&str]) -> Result<Command, ProtocolError> {
        Command::from_frame(Frame::command(tokens))
    }

    #[test]
    fn ping_variants() {
        assert_eq!(parse(&["PING"]).unwrap(), Command::Ping(None));
        assert_eq!(
            parse(&["ping", "hello"]).unwrap(),
            Command::Ping(Some(Bytes::from_static(b"hello")))
        );
        assert!(matches!(
            parse(&["PING", "a", "b"]),
            Err(ProtocolError::WrongArity(_))
        ));
    }

    #[test]
    fn verbs_are_case_insensitive() {
        assert_eq!(
            parse(&["get", "k"]).unwrap(),
            Command::Get { key: "k".into() }
        );
        assert_eq!(
            parse(&["GeT", "k"]).unwrap(),
            Command::Get { key: "k".into() }
        );
    }

    #[test]
    fn set_plain_and_with_expire() {
        assert_eq!(
            parse(&["SET", "k", "v"]).unwrap(),
            Command::Set {
                key: "k".into(),
                value: Bytes::from_static(b"v"),
                expire: None,
            }
        );
        assert_eq!(
            parse(&["SET", "k", "v", "EX", "10"]).unwrap(),
            Command::Set {
                key: "k".into(),
                value: Bytes::from_static(b"v"),
                expire: Some(SetExpire::Ex(10)),
            }
        );
        assert_eq!(
            parse(&["SET", "k", "v", "px", "500"]).unwrap(),
            Command::Set {
                key: "k".into(),
                value: Bytes::from_static(b"v"),
                expire: Some(SetExpire::Px(500)),
            }
        );
    }

    #[test]
    fn set_rejects_bad_expire() {
        assert!(matches!(
            parse(&["SET", "k", "v", "EX", "abc"]),
            Err(ProtocolError::NotInteger)
        ));
        assert!(matches!(
            parse(&["SET", "k", "v", "XX", "10"]),
            Err(ProtocolError::Syntax)
        ));
        assert!(matches!(
            parse(&["SET", "k", "v", "EX"]),
            Err(ProtocolError::Syntax)
        ));
        assert!(parse(&["SET", "k", "v", "EX", "0"]).is_err());
    }

    #[test]
    fn expire_accepts_negative_duration() {
        assert_eq!(
            parse(&["EXPIRE", "k", "-5"]).unwrap(),
            Command::Expire {
                key: "k".into(),
                seconds: -5,
            }
        );
    }

    #[test]
    fn del_and_exists_are_variadic() {
        assert_eq!(
            parse(&["DEL", "a", "b"]).unwrap(),
            Command::Del {
                keys: vec!["a".into(), "b".into()],
            }
        );
        assert!(matches!(parse(&["DEL"]), Err(ProtocolError::WrongArity(_))));
    }

    #[test]
    fn hset_requires_pairs() {
        assert_eq!(
            parse(&["HSET", "h", "f1", "v1", "f2", "v2"]).unwrap(),
            Command::HSet {
                key: "h".into(),
                fields: vec![
                    ("f1".into(), Bytes::from_static(b"v1")),
                    ("f2".into(), Bytes::from_static(b"v2")),
                ],
            }
        );
        assert!(matches!(
            parse(&["HSET", "h", "f1"]),
            Err(ProtocolError::WrongArity(_))
        ));
        assert!(matches!(
            parse(&["HSET", "h", "f1", "v1", "dangling"]),
            Err(ProtocolError::WrongArity(_))
        ));
    }

    #[test]
    fn lrange_coerces_integers() {
        assert_eq!(
            parse(&["LRANGE", "q", "0", "-1"]).unwrap(),
            Command::LRange {
                key: "q".into(),
                start: 0,
                stop: -1,
            }
        );
        assert!(matches!(
            parse(&["LRANGE", "q", "zero", "-1"]),
            Err(ProtocolError::NotInteger)
        ));
    }

    #[test]
    fn zadd_parses_score_member_pairs() {
        assert_eq!(
            parse(&["ZADD", "z", "1", "a", "2.5", "b"]).unwrap(),
            Command::ZAdd {
                key: "z".into(),
                pairs: vec![(1.0, "a".into()), (2.5, "b".into())],
            }
        );
        assert!(matches!(
            parse(&["ZADD", "z", "one", "a"]),
            Err(ProtocolError::NotFloat)
        ));
        assert!(matches!(
            parse(&["ZADD", "z", "1"]),
            Err(ProtocolError::WrongArity(_))
        ));
    }

    #[test]
    fn zadd_accepts_infinities_but_not_nan() {
        assert_eq!(
            parse(&["ZADD", "z", "+inf", "a"]).unwrap(),
            Command::ZAdd {
                key: "z".into(),
                pairs: vec![(f64::INFINITY, "a".into())],
            }
        );
        assert!(matches!(
            parse(&["ZADD", "z", "nan", "a"]),
            Err(ProtocolError::NotFloat)
        ));
    }

    #[test]
    fn zrange_withscores_flag() {
        assert_eq!(
            parse(&["ZRANGE", "z", "0", "-1", "WITHSCORES"]).unwrap(),
            Command::ZRange {
                key: "z".into(),
                start: 0,
                stop: -1,
                with_scores: true,
            }
        );
        assert!(matches!(
            parse(&["ZRANGE", "z", "0", "-1", "BOGUS"]),
            Err(ProtocolError::Syntax)
        ));
    }

    #[test]
    fn setrange_rejects_negative_offset() {
        assert!(parse(&["SETRANGE", "k", "-1", "v"]).is_err());
        assert_eq!(
            parse(&["SETRANGE", "k", "5", "v"]).unwrap(),
            Command::SetRange {
                key: "k".into(),
                offset: 5,
                value: Bytes::from_static(b"v"),
            }
        );
    }

    #[test]
    fn slowlog_subcommands() {
        assert_eq!(
            parse(&["SLOWLOG", "GET"]).unwrap(),
            Command::SlowLog(SlowLogSub::Get(None))
        );
        assert_eq!(
            parse(&["SLOWLOG", "get", "5"]).unwrap(),
            Command::SlowLog(SlowLogSub::Get(Some(5)))
        );
        assert_eq!(
            parse(&["SLOWLOG", "RESET"]).unwrap(),
            Command::SlowLog(SlowLogSub::Reset)
        );
        assert_eq!(
            parse(&["SLOWLOG", "LEN"]).unwrap(),
            Command::SlowLog(SlowLogSub::Len)
        );
        assert!(matches!(
            parse(&["SLOWLOG", "BOGUS"]),
            Err(ProtocolError::Syntax)
        ));
    }

    #[test]
    fn config_only_supports_get() {
        assert_eq!(
            parse(&["CONFIG", "GET", "port"]).unwrap(),
            Command::ConfigGet {
                parameter: "port".into(),
            }
        );
        assert!(matches!(
            parse(&["CONFIG", "SET", "port"]),
            Err(ProtocolError::Syntax)
        ));
    }

    #[test]
    fn unknown_verb_is_preserved() {
        assert_eq!(
            parse(&["FROBNICATE", "x"]).unwrap(),
            Command::Unknown("FROBNICATE".into())
        );
    }

    #[test]
    fn non_array_frame_rejected() {
        assert!(Command::from_frame(Frame::Simple("GET".into())).is_err());
        assert!(Command::from_frame(Frame::Array(vec![])).is_err());
    }

    #[test]
    fn select_parses_index() {
        assert_eq!(parse(&["SELECT", "3"]).unwrap(), Command::Select { index: 3 });
        assert!(matches!(
            parse(&["SELECT", "-1"]),
            Err(ProtocolError::NotInteger)
        ));
        assert!(matches!(
            parse(&["SELECT", "two"]),
            Err(ProtocolError::NotInteger)
        ));
    }
}
