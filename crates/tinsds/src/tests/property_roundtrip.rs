use alloc::vec::Vec;

use quickcheck::QuickCheck;

use super::arbitrary::NonNulBytes;
use crate::{Sds, SizeClass, split, split_args};

fn tests() -> u64 {
    #[cfg(not(miri))]
    let tests = if is_ci::cached() { 10_000 } else { 1_000 };
    #[cfg(miri)]
    let tests = 10;
    tests
}

/// Property: the quoted representation of any zero-free byte string is read
/// back by the argument tokenizer as exactly one token with the same bytes.
#[test]
fn repr_then_split_args_roundtrip() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(bytes: NonNulBytes) -> bool {
        let mut line = Sds::new().unwrap();
        line.append_repr(&bytes.0, true).unwrap();
        let tokens = split_args(&line).unwrap();
        tokens.len() == 1 && tokens[0] == bytes.0.as_slice()
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(NonNulBytes) -> bool);
}

/// Property: several representations on one line come back in order.
#[test]
fn repr_line_of_many_tokens() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(parts: Vec<NonNulBytes>) -> bool {
        let mut line = Sds::new().unwrap();
        for part in &parts {
            line.append_repr(&part.0, true).unwrap();
            line.push(b' ').unwrap();
        }
        let tokens = split_args(&line).unwrap();
        tokens.len() == parts.len() && tokens.iter().zip(&parts).all(|(t, p)| *t == p.0.as_slice())
    }

    QuickCheck::new()
        .tests(tests() / 10)
        .quickcheck(prop as fn(Vec<NonNulBytes>) -> bool);
}

/// Property: joining split fields with the same separator rebuilds the input.
#[test]
fn split_then_join_roundtrip() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(bytes: Vec<u8>, sep: Vec<u8>) -> bool {
        let fields = split(&bytes, &sep).unwrap();
        if bytes.is_empty() || sep.is_empty() {
            return fields.is_empty();
        }
        Sds::join_sds(&fields, &sep).unwrap() == bytes.as_slice()
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(Vec<u8>, Vec<u8>) -> bool);
}

#[test]
fn growth_from_ten_bytes_crosses_classes() {
    let mut s = Sds::from_bytes(b"0123456789").unwrap();
    let mut seen = Vec::new();
    for i in 0..100_000u32 {
        s.push(b'a' + u8::try_from(i % 26).unwrap()).unwrap();
        if seen.last() != Some(&s.size_class()) {
            seen.push(s.size_class());
        }
    }
    assert_eq!(
        seen,
        [SizeClass::U8, SizeClass::U16, SizeClass::U32],
        "classes visited while growing"
    );
    assert_eq!(s.len(), 100_010);
    assert_eq!(&s[..10], b"0123456789");
    s.assert_invariants();
}

/// Property: integer constructors agree with `core`'s decimal rendering.
#[quickcheck_macros::quickcheck]
fn decimal_constructors_match_display(v: i64, u: u64) -> bool {
    Sds::from_i64(v).unwrap() == alloc::format!("{v}").as_str()
        && Sds::from_u64(u).unwrap() == alloc::format!("{u}").as_str()
}
