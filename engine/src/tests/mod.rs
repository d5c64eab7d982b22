

// Runtime tests
mod evaluation;

use crate::{Context, ProvenanceMode, ResourceLimits, Tuple};

pub(crate) fn run_with(mode: ProvenanceMode, program: &str) -> Context {
    let mut ctx = Context::new(mode);
    ctx.add_program(program).unwrap();
    ctx.run().unwrap();
    ctx
}

pub(crate) fn run_unit(program: &str) -> Context {
    run_with(ProvenanceMode::Unit, program)
}

pub(crate) fn run_limited(program: &str, limits: ResourceLimits) -> crate::SclResult<Context> {
    let mut ctx = Context::with_limits(ProvenanceMode::Unit, limits);
    ctx.add_program(program)?;
    ctx.run()?;
    Ok(ctx)
}

pub(crate) fn tuples(ctx: &Context, relation: &str) -> Vec<Tuple> {
    ctx.relation(relation)
        .unwrap()
        .iter()
        .map(|(_, tuple)| tuple.clone())
        .collect()
}

pub(crate) fn weight_of(ctx: &Context, relation: &str, tuple: &[crate::Value]) -> f64 {
    ctx.relation(relation)
        .unwrap()
        .iter()
        .find(|(_, t)| t.as_slice() == tuple)
        .map(|(w, _)| *w)
        .unwrap_or_else(|| panic!("{} has no tuple {:?}", relation, tuple))
}

pub(crate) fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
