use crate::marshal::Projection;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Row, Table};
use scl::compiler::RelationOrigin;
use scl::{format_tuple, CompiledProgram};

pub struct Formatter {}

impl Default for Formatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter {
    pub fn new() -> Self {
        Self {}
    }

    /// One table per output relation, in output name order
    pub fn format_projection(&self, projection: &Projection) -> String {
        let mut output = String::new();
        for (name, tuples) in projection {
            output.push_str(&format!("{} ({} tuple(s))\n", name, tuples.len()));
            if tuples.is_empty() {
                output.push('\n');
                continue;
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(Row::from(vec![
                Cell::new("Weight").set_alignment(CellAlignment::Right),
                Cell::new("Tuple").set_alignment(CellAlignment::Left),
            ]));
            for tuple in tuples {
                table.add_row(Row::from(vec![
                    Cell::new(format_weight(tuple.weight)).set_alignment(CellAlignment::Right),
                    Cell::new(format_tuple(&tuple.values)),
                ]));
            }
            output.push_str(&table.to_string());
            output.push_str("\n\n");
        }
        output
    }

    /// Relation signatures of a compiled program
    pub fn format_program_summary(&self, program: &CompiledProgram) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(Row::from(vec!["Relation", "Arity", "Types", "Defined by"]));

        for signature in program.relations.values() {
            let types = signature
                .types
                .as_ref()
                .map(|types| {
                    types
                        .iter()
                        .map(|t| t.name())
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_else(|| "?".to_string());
            table.add_row(Row::from(vec![
                signature.name.clone(),
                signature.arity.to_string(),
                types,
                origin_label(signature.origin).to_string(),
            ]));
        }

        let rules: usize = program.strata.iter().map(|s| s.rules.len()).sum();
        format!(
            "{}\n{} relation(s), {} fact(s), {} rule(s) in {} strata\n",
            table,
            program.relations.len(),
            program.facts.len(),
            rules,
            program.strata.len()
        )
    }
}

fn origin_label(origin: RelationOrigin) -> &'static str {
    match origin {
        RelationOrigin::Input => "input",
        RelationOrigin::Declared => "type declaration",
        RelationOrigin::Facts => "facts",
        RelationOrigin::Derived => "rules",
    }
}

fn format_weight(weight: f64) -> String {
    if weight.fract() == 0.0 {
        format!("{:.1}", weight)
    } else {
        format!("{:.4}", weight)
            .trim_end_matches('0')
            .to_string()
    }
}
