#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tinsds::{FmtArg, Sds};

#[derive(Debug, Arbitrary)]
enum Op<'a> {
    Append(&'a [u8]),
    Repeat(u16, u8),
    CopyFrom(&'a [u8]),
    GrowZeroed(u16),
    Range(i16, i16),
    Trim(&'a [u8]),
    Truncate(u16),
    Clear,
    Reserve(u16),
    ReserveExact(u16),
    ShrinkToFit,
    MapBytes(&'a [u8], &'a [u8]),
    Repr(&'a [u8], bool),
    Fmt(&'a str, i64, u64, u8),
    UpdateLen,
    Duplicate,
}

fuzz_target!(|ops: Vec<Op<'_>>| {
    let mut s = Sds::new().unwrap();
    let mut model: Vec<u8> = Vec::new();

    for op in ops {
        match op {
            Op::Append(bytes) => {
                s.append(bytes).unwrap();
                model.extend_from_slice(bytes);
            }
            Op::Repeat(n, b) => {
                let bytes = vec![b; usize::from(n)];
                s.append(&bytes).unwrap();
                model.extend_from_slice(&bytes);
            }
            Op::CopyFrom(bytes) => {
                s.copy_from(bytes).unwrap();
                model = bytes.to_vec();
            }
            Op::GrowZeroed(n) => {
                let n = usize::from(n);
                s.grow_zeroed(n).unwrap();
                if n > model.len() {
                    model.resize(n, 0);
                }
            }
            Op::Range(start, end) => {
                s.range(isize::from(start), isize::from(end));
                model = s.as_bytes().to_vec();
            }
            Op::Trim(cset) => {
                s.trim(cset);
                let start = model.iter().position(|b| !cset.contains(b)).unwrap_or(model.len());
                let end = model.iter().rposition(|b| !cset.contains(b)).map_or(start, |i| i + 1);
                model = model[start..end].to_vec();
            }
            Op::Truncate(n) => {
                s.truncate(usize::from(n));
                model.truncate(usize::from(n));
            }
            Op::Clear => {
                s.clear();
                model.clear();
            }
            Op::Reserve(n) => {
                s.reserve(usize::from(n)).unwrap();
                assert!(s.spare_capacity() >= usize::from(n));
            }
            Op::ReserveExact(n) => {
                s.reserve_exact(usize::from(n)).unwrap();
                assert!(s.spare_capacity() >= usize::from(n));
            }
            Op::ShrinkToFit => {
                s.shrink_to_fit().unwrap();
                let addr = s.as_ptr();
                s.shrink_to_fit().unwrap();
                assert_eq!(s.as_ptr(), addr);
                assert_eq!(s.spare_capacity(), 0);
            }
            Op::MapBytes(from, to) => {
                s.map_bytes(from, to);
                model = s.as_bytes().to_vec();
            }
            Op::Repr(bytes, quoted) => {
                let before = s.len();
                s.append_repr(bytes, quoted).unwrap();
                model.extend_from_slice(&s[before..]);
                if quoted && !bytes.contains(&0) {
                    let tokens = tinsds::split_args(&s[before..]).unwrap();
                    assert_eq!(tokens.len(), 1);
                    assert_eq!(tokens[0], bytes);
                }
            }
            Op::Fmt(fmt, i, u, c) => {
                let before = s.len();
                let args = [
                    FmtArg::Long(i),
                    FmtArg::ULong(u),
                    FmtArg::Byte(c),
                    FmtArg::Str(fmt.as_bytes()),
                ];
                if s.append_fmt(fmt, &args).is_err() {
                    assert_eq!(s.len(), before);
                }
                model.extend_from_slice(&s[before..]);
            }
            Op::UpdateLen => {
                s.update_len();
                if let Some(nul) = model.iter().position(|&b| b == 0) {
                    model.truncate(nul);
                }
            }
            Op::Duplicate => {
                let copy = s.try_clone().unwrap();
                copy.assert_invariants();
                assert_eq!(copy, s);
                s = copy;
            }
        }
        s.assert_invariants();
        assert_eq!(s.as_bytes(), model.as_slice());
    }
});
