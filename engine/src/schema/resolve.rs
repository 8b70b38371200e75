//! The type promotion lattice. `Text` is absorbing; the only non-`Text`
//! promotion is `WholeNumber` with `FloatingPoint`.

use super::ColumnType;

/// Union the type a column holds with a newly observed one.
///
/// | pair | result |
/// |---|---|
/// | same type | that type |
/// | any + `Text` | `Text` |
/// | `WholeNumber` + `FloatingPoint` | `FloatingPoint` |
/// | anything else | `Text` |
pub fn resolve(current: ColumnType, observed: ColumnType) -> ColumnType {
    use ColumnType::*;
    match (current, observed) {
        (a, b) if a == b => a,
        (WholeNumber, FloatingPoint) | (FloatingPoint, WholeNumber) => FloatingPoint,
        _ => Text,
    }
}
