//! Values and names that tend to exercise interesting engine paths.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

pub const INTERESTING_INTEGERS: &[i64] = &[
    -9007199254740993,
    -9007199254740992,
    -4294967297,
    -4294967296,
    -2147483649,
    -2147483648,
    -1073741824,
    -65536,
    -4096,
    -1024,
    -256,
    -128,
    -2,
    -1,
    0,
    1,
    2,
    3,
    4,
    5,
    6,
    7,
    8,
    16,
    64,
    127,
    128,
    255,
    256,
    1024,
    4096,
    65535,
    65536,
    1073741823,
    1073741824,
    2147483647,
    2147483648,
    4294967295,
    4294967296,
    9007199254740991,
    9007199254740992,
];

pub const INTERESTING_FLOATS: &[f64] = &[
    -1e-15,
    -1e12,
    -1e9,
    -1e6,
    -1e3,
    -5.0,
    -4.0,
    -3.0,
    -2.0,
    -1.0,
    -0.5,
    -0.0,
    0.0,
    0.5,
    1.0,
    1.5,
    2.0,
    3.0,
    1e3,
    1e6,
    1e9,
    1e12,
    1e-15,
    f64::MIN_POSITIVE,
    f64::EPSILON,
    f64::MAX,
    f64::MIN,
    f64::INFINITY,
    f64::NEG_INFINITY,
    f64::NAN,
];

pub const INTERESTING_STRINGS: &[&str] = &[
    "",
    "a",
    "foo",
    "bar",
    "0",
    "1",
    "-1",
    "NaN",
    "Infinity",
    "undefined",
    "null",
    "length",
    "__proto__",
    "constructor",
    "prototype",
    "toString",
    "valueOf",
    "\u{0}",
    "\u{ffff}",
    "\u{1f600}",
];

pub const BUILTINS: &[&str] = &[
    "Object",
    "Array",
    "Function",
    "String",
    "Number",
    "Boolean",
    "Symbol",
    "BigInt",
    "Math",
    "JSON",
    "Reflect",
    "Proxy",
    "Promise",
    "Map",
    "Set",
    "WeakMap",
    "WeakSet",
    "ArrayBuffer",
    "DataView",
    "Uint8Array",
    "Int32Array",
    "Float64Array",
    "RegExp",
    "Date",
    "Error",
    "TypeError",
    "globalThis",
    "parseInt",
    "parseFloat",
    "isNaN",
    "gc",
];

pub const PROPERTY_NAMES: &[&str] = &[
    "a",
    "b",
    "c",
    "d",
    "e",
    "length",
    "prototype",
    "constructor",
    "__proto__",
    "size",
    "byteLength",
    "buffer",
    "source",
    "flags",
    "lastIndex",
    "name",
    "message",
    "value",
    "done",
];

pub const METHOD_NAMES: &[&str] = &[
    "m",
    "n",
    "toString",
    "valueOf",
    "push",
    "pop",
    "shift",
    "unshift",
    "slice",
    "splice",
    "concat",
    "indexOf",
    "map",
    "filter",
    "reduce",
    "forEach",
    "sort",
    "fill",
    "keys",
    "values",
    "entries",
    "call",
    "apply",
    "bind",
    "then",
    "set",
    "get",
    "has",
    "delete",
    "charCodeAt",
    "replace",
    "split",
];

pub const REGEXP_PATTERNS: &[&str] = &[
    "a",
    "[a-z]+",
    "(a|b)*c",
    "\\d{2,}",
    "^\\s*$",
    "(?<name>x)\\k<name>",
    "(?=a)b",
    "(?<!a)b",
    "\\p{L}",
    ".",
];

pub const REGEXP_FLAGS: &[&str] = &["", "g", "i", "m", "s", "u", "y", "gi", "gu", "dgimsuy"];

/// Draws random literals and names for the code generators and mutators.
pub struct Environment;

impl Environment {
    pub fn random_int(rng: &mut ChaCha8Rng) -> i64 {
        if rng.gen_bool(0.7) {
            pick(INTERESTING_INTEGERS, rng, 0)
        } else {
            rng.gen_range(-0x10000..0x10000)
        }
    }

    pub fn random_float(rng: &mut ChaCha8Rng) -> f64 {
        if rng.gen_bool(0.7) {
            pick(INTERESTING_FLOATS, rng, 0.0)
        } else {
            rng.gen_range(-1e6..1e6)
        }
    }

    pub fn random_string(rng: &mut ChaCha8Rng) -> String {
        pick(INTERESTING_STRINGS, rng, "").to_string()
    }

    pub fn random_builtin(rng: &mut ChaCha8Rng) -> String {
        pick(BUILTINS, rng, "Object").to_string()
    }

    pub fn random_property(rng: &mut ChaCha8Rng) -> String {
        pick(PROPERTY_NAMES, rng, "a").to_string()
    }

    pub fn random_method(rng: &mut ChaCha8Rng) -> String {
        pick(METHOD_NAMES, rng, "m").to_string()
    }

    pub fn random_element_index(rng: &mut ChaCha8Rng) -> i64 {
        if rng.gen_bool(0.8) {
            rng.gen_range(0..16)
        } else {
            pick(INTERESTING_INTEGERS, rng, 0)
        }
    }

    pub fn random_regexp(rng: &mut ChaCha8Rng) -> (String, String) {
        (
            pick(REGEXP_PATTERNS, rng, "a").to_string(),
            pick(REGEXP_FLAGS, rng, "").to_string(),
        )
    }
}

fn pick<T: Copy>(values: &[T], rng: &mut ChaCha8Rng, fallback: T) -> T {
    values.choose(rng).copied().unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_random_values_are_deterministic() {
        let mut a = ChaCha8Rng::seed_from_u64(7);
        let mut b = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..20 {
            assert_eq!(Environment::random_int(&mut a), Environment::random_int(&mut b));
            assert_eq!(Environment::random_string(&mut a), Environment::random_string(&mut b));
        }
    }

    #[test]
    fn test_names_come_from_tables() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..50 {
            assert!(BUILTINS.contains(&Environment::random_builtin(&mut rng).as_str()));
            assert!(METHOD_NAMES.contains(&Environment::random_method(&mut rng).as_str()));
        }
    }
}
