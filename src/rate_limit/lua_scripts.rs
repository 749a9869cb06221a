/// Lua script pinning a fixed window on servers without `PEXPIRE ... NX`
///
/// Increments the counter and sets its expiry only when the key has none,
/// so later hits in the same window never push the reset time forward.
/// The expiry comes back as an absolute unix time read off the server clock,
/// so every hit in a window reports the same instant.
///
/// KEYS[1] = the counter key
/// ARGV[1] = window duration (milliseconds)
///
/// Returns: [count after increment, expiry in unix milliseconds, or -1/-2
/// for no expiry/no key]
pub const PINNED_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local window = tonumber(ARGV[1])

local current = redis.call('INCR', key)

-- Only a key without expiry gets one; an existing window stays pinned
if redis.call('PTTL', key) == -1 then
    redis.call('PEXPIRE', key, window)
end

-- Redis 7+ stores the absolute deadline and can hand it back as-is
local expire_time = redis.pcall('PEXPIRETIME', key)
if type(expire_time) == 'number' then
    return {current, expire_time}
end

local ttl = redis.call('PTTL', key)
if ttl < 0 then
    return {current, ttl}
end

local now = redis.call('TIME')
local now_ms = tonumber(now[1]) * 1000 + math.floor(tonumber(now[2]) / 1000)
return {current, now_ms + ttl}
"#;
