#![no_main]

use libfuzzer_sys::fuzz_target;
use scl::{Context, ProvenanceMode};

fuzz_target!(|depth: u8| {
    let depth = (depth as usize % 50) + 1;

    let mut expr = String::from("x");
    for _ in 0..depth {
        expr = format!("({} + 1)", expr);
    }

    let mut ctx = Context::new(ProvenanceMode::Unit);
    let code = format!("rel n = {{(1)}}\nrel deep({}) = n(x)", expr);
    if ctx.add_program(&code).is_ok() {
        let _ = ctx.run();
    }
});
