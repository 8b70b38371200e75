//! Filter predicate evaluation, shared by the transformer and the filter
//! index build. String comparisons are ordinal case-insensitive; numeric and
//! timestamp comparisons exclude rows whose cell (or filter value) does not
//! parse.

use crate::schema::{parse_timestamp, ColumnType};

use super::{FilterOperator, FilterSpec};

/// Whether `raw` satisfies one filter. Rows match a stack of filters iff
/// every spec matches.
pub(crate) fn matches(spec: &FilterSpec, raw: &str) -> bool {
    use FilterOperator::*;
    match spec.operator {
        Eq => eq_ignore_case(raw, &spec.value),
        Ne => !eq_ignore_case(raw, &spec.value),
        Contains => lower(raw).contains(&lower(&spec.value)),
        NotContains => !lower(raw).contains(&lower(&spec.value)),
        StartsWith => lower(raw).starts_with(&lower(&spec.value)),
        EndsWith => lower(raw).ends_with(&lower(&spec.value)),
        Gt | Lt | Ge | Le => ordered(spec, raw),
    }
}

fn ordered(spec: &FilterSpec, raw: &str) -> bool {
    use std::cmp::Ordering;
    use FilterOperator::*;

    let ordering = match spec.column_type {
        ColumnType::WholeNumber => compare_parsed::<i64>(raw, &spec.value),
        ColumnType::FloatingPoint => {
            match (raw.trim().parse::<f64>(), spec.value.trim().parse::<f64>()) {
                (Ok(cell), Ok(value)) => cell.partial_cmp(&value),
                _ => None,
            }
        }
        ColumnType::Timestamp => {
            match (parse_timestamp(raw.trim()), parse_timestamp(spec.value.trim())) {
                (Some(cell), Some(value)) => Some(cell.cmp(&value)),
                _ => None,
            }
        }
        // order has no meaning on text-shaped columns: degrade to equality
        _ => {
            let equal = eq_ignore_case(raw, &spec.value);
            return match spec.operator {
                Gt | Ge => equal,
                _ => !equal,
            };
        }
    };
    // a cell that does not parse is excluded, whatever the operator
    let Some(ordering) = ordering else {
        return false;
    };
    match spec.operator {
        Gt => ordering == Ordering::Greater,
        Lt => ordering == Ordering::Less,
        Ge => ordering != Ordering::Less,
        Le => ordering != Ordering::Greater,
        _ => unreachable!("ordered() is only called for order operators"),
    }
}

fn compare_parsed<T: Ord + std::str::FromStr>(raw: &str, value: &str) -> Option<std::cmp::Ordering> {
    match (raw.trim().parse::<T>(), value.trim().parse::<T>()) {
        (Ok(cell), Ok(value)) => Some(cell.cmp(&value)),
        _ => None,
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    lower(a) == lower(b)
}

fn lower(s: &str) -> String {
    s.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(column_type: ColumnType, operator: FilterOperator, value: &str) -> FilterSpec {
        FilterSpec {
            source_column_index: 0,
            column_type,
            operator,
            value: value.to_string(),
        }
    }

    #[test]
    fn string_predicates_ignore_case() {
        use FilterOperator::*;
        assert!(matches(&spec(ColumnType::Text, Eq, "ALICE"), "alice"));
        assert!(matches(&spec(ColumnType::Text, Ne, "bob"), "alice"));
        assert!(matches(&spec(ColumnType::Text, Contains, "LIC"), "Alice"));
        assert!(matches(&spec(ColumnType::Text, NotContains, "zzz"), "Alice"));
        assert!(matches(&spec(ColumnType::Text, StartsWith, "al"), "Alice"));
        assert!(matches(&spec(ColumnType::Text, EndsWith, "CE"), "Alice"));
    }

    #[test]
    fn whole_number_ordering() {
        use FilterOperator::*;
        let gt25 = spec(ColumnType::WholeNumber, Gt, "25");
        assert!(matches(&gt25, "30"));
        assert!(!matches(&gt25, "25"));
        assert!(!matches(&gt25, "7"));
        assert!(matches(&spec(ColumnType::WholeNumber, Ge, "25"), "25"));
        assert!(matches(&spec(ColumnType::WholeNumber, Le, "25"), "25"));
        assert!(matches(&spec(ColumnType::WholeNumber, Lt, "25"), "-3"));
        // unparseable cells are excluded
        assert!(!matches(&gt25, "abc"));
        assert!(!matches(&gt25, ""));
    }

    #[test]
    fn floating_point_and_timestamp_ordering() {
        use FilterOperator::*;
        assert!(matches(&spec(ColumnType::FloatingPoint, Gt, "2.5"), "2.75"));
        assert!(!matches(&spec(ColumnType::FloatingPoint, Gt, "2.5"), "nope"));
        assert!(matches(
            &spec(ColumnType::Timestamp, Ge, "2024-01-01"),
            "2024-06-15"
        ));
        assert!(!matches(
            &spec(ColumnType::Timestamp, Lt, "2024-01-01"),
            "2024-06-15"
        ));
    }

    #[test]
    fn order_operators_on_text_degrade_to_equality() {
        use FilterOperator::*;
        assert!(matches(&spec(ColumnType::Text, Gt, "x"), "X"));
        assert!(!matches(&spec(ColumnType::Text, Gt, "x"), "y"));
        assert!(matches(&spec(ColumnType::Text, Ge, "x"), "x"));
        assert!(matches(&spec(ColumnType::Text, Lt, "x"), "y"));
        assert!(!matches(&spec(ColumnType::Text, Le, "x"), "x"));
    }
}
