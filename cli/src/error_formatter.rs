use ariadne::{Color, Label, Report, ReportKind, Source};
use scl::SclError;

/// Format an SclError with fancy terminal output using Ariadne
pub fn format_error(error: &SclError) -> String {
    let Some(details) = error.details() else {
        return error.to_string();
    };

    let error_type = match error {
        SclError::Parse(_) => "Parse error",
        _ => "Compile error",
    };
    let message = format!(
        "{}: {} (at {}:{}:{})",
        error_type, details.message, details.source_id, details.span.line, details.span.col
    );

    let mut report = Report::build(ReportKind::Error, &details.source_id, details.span.start)
        .with_message(message)
        .with_label(
            Label::new((&details.source_id, details.span.start..details.span.end))
                .with_message("")
                .with_color(Color::Red),
        );
    if let Some(suggestion) = &details.suggestion {
        report = report.with_help(suggestion);
    }

    let mut output = Vec::new();
    match report.finish().write(
        (
            &details.source_id,
            Source::from(details.source_text.as_ref()),
        ),
        &mut output,
    ) {
        Ok(_) => String::from_utf8_lossy(&output).to_string(),
        Err(_) => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scl::{Context, ProvenanceMode};

    #[test]
    fn test_parse_error_points_into_source() {
        let mut ctx = Context::new(ProvenanceMode::Unit);
        let err = ctx.add_program_with_id("rel p(1\n", "family.scl").unwrap_err();
        let output = format_error(&err);
        assert!(output.contains("Parse error"));
        assert!(output.contains("family.scl"));
    }

    #[test]
    fn test_compile_error_carries_suggestion() {
        let mut ctx = Context::new(ProvenanceMode::Unit);
        ctx.add_program("rel path(a, b) = edge(a, b)\nrel edges(0, 1)")
            .unwrap();
        let err = ctx.run().unwrap_err();
        let output = format_error(&err);
        assert!(output.contains("Compile error"));
        assert!(output.contains("edge"));
    }

    #[test]
    fn test_errors_without_source_fall_back_to_display() {
        let err = SclError::UnknownRelation("cousin".to_string());
        assert_eq!(format_error(&err), "Unknown relation 'cousin'");
    }
}
