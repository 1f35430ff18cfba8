//! Generated filler: arithmetic stand-ins for integer literals and
//! unreachable blocks for dead-code injection.

use rand::Rng;

use crate::random::random_hex_name;

/// Largest literal rewritten as an expression.
pub const MAX_EXPRESSIBLE: f64 = 2_147_483_647.0;

/// Whether a numeric literal is rewritten by [`number_expression`].
pub fn is_expressible(value: f64) -> bool {
    value.fract() == 0.0 && (0.0..=MAX_EXPRESSIBLE).contains(&value)
}

/// A parenthesized expression evaluating to `value`, e.g. `(0x1f*0x3+-0x2a)`.
pub fn number_expression(value: u64, rng: &mut impl Rng) -> String {
    let a: u64 = rng.random_range(0x10..=0xfff);
    let b: u64 = rng.random_range(0x2..=0xff);
    let product = a * b;

    if product > value {
        format!("(0x{a:x}*0x{b:x}+-0x{:x})", product - value)
    } else {
        format!("(0x{a:x}*0x{b:x}+0x{:x})", value - product)
    }
}

/// A block that is syntactically a statement and never runs.
pub fn dead_code_block(rng: &mut impl Rng) -> String {
    let a: u32 = rng.random_range(0..0xffff);
    let b: u32 = loop {
        let b = rng.random_range(0..0xffff);
        if b != a {
            break b;
        }
    };
    let c: u32 = rng.random_range(0..0xffff);
    let name = random_hex_name("_0x", 6);

    let body = match rng.random_range(0..3) {
        0 => format!("let {name}=0x{c:x};{name}^=0x{a:x};"),
        1 => format!("let {name}=[];{name}.push(0x{c:x});"),
        _ => format!("let {name}=function(){{return 0x{c:x}}};{name}();"),
    };
    format!("if(0x{a:x}===0x{b:x}){{{body}}}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &str) -> i64 {
        // (0xA*0xB+0xC) or (0xA*0xB+-0xC)
        let inner = expr.trim_start_matches('(').trim_end_matches(')');
        let (product, rest) = inner.split_once('+').unwrap();
        let (a, b) = product.split_once('*').unwrap();
        let hex = |s: &str| i64::from_str_radix(s.trim_start_matches("0x"), 16).unwrap();
        let rest = match rest.strip_prefix('-') {
            Some(r) => -hex(r),
            None => hex(rest),
        };
        hex(a) * hex(b) + rest
    }

    #[test]
    fn expressions_evaluate_to_their_value() {
        let mut rng = rand::rng();
        for value in [0u64, 1, 7, 255, 4096, 65_535, 1_000_000, 2_147_483_647] {
            for _ in 0..20 {
                let expr = number_expression(value, &mut rng);
                assert_eq!(eval(&expr), value as i64, "{expr}");
            }
        }
    }

    #[test]
    fn only_small_non_negative_integers_are_expressible() {
        assert!(is_expressible(0.0));
        assert!(is_expressible(443.0));
        assert!(is_expressible(MAX_EXPRESSIBLE));
        assert!(!is_expressible(MAX_EXPRESSIBLE + 1.0));
        assert!(!is_expressible(1.5));
        assert!(!is_expressible(-1.0));
        assert!(!is_expressible(f64::NAN));
    }

    #[test]
    fn dead_code_condition_is_always_false() {
        let mut rng = rand::rng();
        for _ in 0..50 {
            let block = dead_code_block(&mut rng);
            let cond = block
                .strip_prefix("if(")
                .and_then(|s| s.split_once(')'))
                .map(|(c, _)| c)
                .unwrap();
            let (a, b) = cond.split_once("===").unwrap();
            assert_ne!(a, b);
            assert!(block.ends_with('}'));
        }
    }
}
