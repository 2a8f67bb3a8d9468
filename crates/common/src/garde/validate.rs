use garde::{Report, Validate};

/// Run garde rules on `value` and describe every broken rule.
///
/// The description is `field: message` pairs, comma separated, in the order
/// garde reports them.
pub fn broken_rules<T>(value: &T) -> Option<String>
where
    T: Validate,
    T::Context: Default,
{
    value.validate().err().map(|report| describe(&report))
}

fn describe(report: &Report) -> String {
    report
        .iter()
        .map(|(path, error)| match path.to_string() {
            p if p.is_empty() => error.message().to_string(),
            p => format!("{}: {}", p, error.message()),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
