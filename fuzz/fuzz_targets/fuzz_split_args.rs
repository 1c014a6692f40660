#![no_main]

use libfuzzer_sys::fuzz_target;
use tinsds::{Sds, split_args};

fuzz_target!(|line: &[u8]| {
    let Ok(tokens) = split_args(line) else {
        return;
    };
    for token in &tokens {
        token.assert_invariants();
    }

    // Re-quoting every token yields a line that parses back to the same
    // tokens, as long as no token carries a zero byte (zero ends the line).
    if tokens.iter().any(|t| t.contains(&0)) {
        return;
    }
    let mut requoted = Sds::new().unwrap();
    for token in &tokens {
        requoted.append_repr(token, true).unwrap();
        requoted.push(b' ').unwrap();
    }
    let again = split_args(&requoted).unwrap();
    assert_eq!(again, tokens);
});
