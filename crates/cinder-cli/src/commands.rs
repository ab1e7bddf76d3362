//! Command metadata for the REPL's help output.

/// One help entry: verb, argument summary, one-line description.
pub struct CommandHelp {
    pub name: &'static str,
    pub args: &'static str,
    pub summary: &'static str,
}

/// The verbs the server understands, grouped for `help`.
pub const COMMANDS: &[(&str, &[CommandHelp])] = &[
    (
        "strings",
        &[
            CommandHelp { name: "SET", args: "key value [EX sec | PX ms]", summary: "store a string" },
            CommandHelp { name: "GET", args: "key", summary: "fetch a string" },
            CommandHelp { name: "APPEND", args: "key value", summary: "append to a string" },
            CommandHelp { name: "GETRANGE", args: "key start end", summary: "substring by byte range" },
            CommandHelp { name: "SETRANGE", args: "key offset value", summary: "overwrite part of a string" },
            CommandHelp { name: "STRLEN", args: "key", summary: "string length" },
        ],
    ),
    (
        "keys",
        &[
            CommandHelp { name: "DEL", args: "key [key ...]", summary: "delete keys" },
            CommandHelp { name: "EXISTS", args: "key [key ...]", summary: "count existing keys" },
            CommandHelp { name: "TYPE", args: "key", summary: "type of a key" },
            CommandHelp { name: "KEYS", args: "pattern", summary: "keys matching a glob" },
            CommandHelp { name: "EXPIRE", args: "key seconds", summary: "set or clear a deadline" },
            CommandHelp { name: "TTL", args: "key", summary: "remaining time to live" },
            CommandHelp { name: "SELECT", args: "index", summary: "switch database" },
            CommandHelp { name: "DBSIZE", args: "", summary: "keys in the current database" },
            CommandHelp { name: "FLUSHDB", args: "", summary: "clear the current database" },
            CommandHelp { name: "FLUSHALL", args: "", summary: "clear every database" },
        ],
    ),
    (
        "hashes",
        &[
            CommandHelp { name: "HSET", args: "key field value [field value ...]", summary: "set hash fields" },
            CommandHelp { name: "HGET", args: "key field", summary: "fetch a field" },
            CommandHelp { name: "HDEL", args: "key field [field ...]", summary: "delete fields" },
            CommandHelp { name: "HLEN", args: "key", summary: "field count" },
            CommandHelp { name: "HEXISTS", args: "key field", summary: "field presence" },
            CommandHelp { name: "HKEYS", args: "key", summary: "all field names" },
            CommandHelp { name: "HVALS", args: "key", summary: "all field values" },
            CommandHelp { name: "HGETALL", args: "key", summary: "all fields and values" },
        ],
    ),
    (
        "lists",
        &[
            CommandHelp { name: "LPUSH", args: "key value [value ...]", summary: "push at the head" },
            CommandHelp { name: "RPUSH", args: "key value [value ...]", summary: "push at the tail" },
            CommandHelp { name: "LPOP", args: "key", summary: "pop from the head" },
            CommandHelp { name: "RPOP", args: "key", summary: "pop from the tail" },
            CommandHelp { name: "LLEN", args: "key", summary: "list length" },
            CommandHelp { name: "LRANGE", args: "key start stop", summary: "elements by index range" },
            CommandHelp { name: "LINDEX", args: "key index", summary: "element at an index" },
            CommandHelp { name: "LSET", args: "key index value", summary: "replace an element" },
        ],
    ),
    (
        "sets",
        &[
            CommandHelp { name: "SADD", args: "key member [member ...]", summary: "add members" },
            CommandHelp { name: "SREM", args: "key member [member ...]", summary: "remove members" },
            CommandHelp { name: "SMEMBERS", args: "key", summary: "all members" },
            CommandHelp { name: "SCARD", args: "key", summary: "member count" },
            CommandHelp { name: "SISMEMBER", args: "key member", summary: "membership test" },
            CommandHelp { name: "SUNION", args: "key [key ...]", summary: "union of sets" },
            CommandHelp { name: "SINTER", args: "key [key ...]", summary: "intersection of sets" },
            CommandHelp { name: "SDIFF", args: "key [key ...]", summary: "difference of sets" },
        ],
    ),
    (
        "sorted sets",
        &[
            CommandHelp { name: "ZADD", args: "key score member [score member ...]", summary: "add scored members" },
            CommandHelp { name: "ZSCORE", args: "key member", summary: "score of a member" },
            CommandHelp { name: "ZREM", args: "key member [member ...]", summary: "remove members" },
            CommandHelp { name: "ZCARD", args: "key", summary: "member count" },
            CommandHelp { name: "ZINCRBY", args: "key delta member", summary: "add to a score" },
            CommandHelp { name: "ZRANGE", args: "key start stop [WITHSCORES]", summary: "members by rank" },
            CommandHelp { name: "ZRANGEBYSCORE", args: "key min max [WITHSCORES]", summary: "members by score" },
        ],
    ),
    (
        "server",
        &[
            CommandHelp { name: "PING", args: "[message]", summary: "liveness check" },
            CommandHelp { name: "ECHO", args: "message", summary: "echo a message" },
            CommandHelp { name: "AUTH", args: "password", summary: "authenticate" },
            CommandHelp { name: "SAVE", args: "", summary: "synchronous snapshot" },
            CommandHelp { name: "BGSAVE", args: "", summary: "background snapshot" },
            CommandHelp { name: "LASTSAVE", args: "", summary: "unix time of last save" },
            CommandHelp { name: "INFO", args: "", summary: "server statistics" },
            CommandHelp { name: "TIME", args: "", summary: "server clock" },
            CommandHelp { name: "CONFIG", args: "GET parameter", summary: "read a config value" },
            CommandHelp { name: "SLOWLOG", args: "GET [n] | RESET | LEN", summary: "slow command log" },
            CommandHelp { name: "MONITOR", args: "", summary: "stream every command" },
        ],
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<&'static str> {
        COMMANDS
            .iter()
            .flat_map(|(_, entries)| entries.iter().map(|help| help.name))
            .collect()
    }

    #[test]
    fn names_are_unique() {
        let mut names = names();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn covers_the_wire_surface() {
        let names = names();
        for verb in [
            "SET", "GET", "DEL", "KEYS", "INFO", "MONITOR", "FLUSHDB", "DBSIZE", "PING", "TIME",
            "SLOWLOG", "CONFIG",
        ] {
            assert!(names.contains(&verb), "missing {verb}");
        }
    }
}
