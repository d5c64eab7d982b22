#![no_main]

use libfuzzer_sys::fuzz_target;
use scl::{Context, ProvenanceMode, ResourceLimits};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let limits = ResourceLimits::default().with_evaluation_time_ms(200);
        let mut ctx = Context::with_limits(ProvenanceMode::default(), limits);
        let code = format!(
            "rel n = {{(0), (1), (2)}}\nrel e = {{0.5::(0, 1), (1, 2)}}\nrel out(x) = {}",
            s
        );
        if ctx.add_program(&code).is_ok() {
            let _ = ctx.run();
        }
    }
});
