use std::cmp::Ordering;
use crate::core::types::FieldValue;
use crate::query::ast::SortOrder;
use crate::query::plan::CompiledSort;

/// Value a hit carries for one sort key
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Field(FieldValue),  // absent fields sort as null
    Score(f32),
}

impl SortValue {
    fn cmp_value(&self, other: &SortValue) -> Ordering {
        match (self, other) {
            (SortValue::Field(a), SortValue::Field(b)) => a.total_cmp(b),
            (SortValue::Score(a), SortValue::Score(b)) => a.total_cmp(b),
            (SortValue::Field(_), SortValue::Score(_)) => Ordering::Less,
            (SortValue::Score(_), SortValue::Field(_)) => Ordering::Greater,
        }
    }
}

/// Compares two sort-value rows key by key, honouring each key's direction
pub fn compare_sort_values(a: &[SortValue], b: &[SortValue], sort: &[CompiledSort]) -> Ordering {
    for (i, key) in sort.iter().enumerate() {
        let (Some(x), Some(y)) = (a.get(i), b.get(i)) else {
            break;
        };
        let ord = match key.order {
            SortOrder::Asc => x.cmp_value(y),
            SortOrder::Desc => x.cmp_value(y).reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::plan::CompiledSortKey;

    fn key(field: &str, order: SortOrder) -> CompiledSort {
        CompiledSort {
            key: CompiledSortKey::Field(field.to_string()),
            order,
        }
    }

    #[test]
    fn later_keys_break_ties_in_their_own_direction() {
        let sort = [key("c", SortOrder::Desc), key("a", SortOrder::Asc)];
        let row = |c: f64, a: &str| vec![SortValue::Field(c.into()), SortValue::Field(a.into())];

        assert_eq!(compare_sort_values(&row(1.0, "bar"), &row(0.0, "aaa"), &sort), Ordering::Less);
        assert_eq!(compare_sort_values(&row(1.0, "bar"), &row(1.0, "baz"), &sort), Ordering::Less);
        assert_eq!(compare_sort_values(&row(1.0, "bar"), &row(1.0, "bar"), &sort), Ordering::Equal);
    }

    #[test]
    fn null_sorts_before_numbers_and_strings() {
        let sort = [key("x", SortOrder::Asc)];
        let null = [SortValue::Field(FieldValue::Null)];
        let number = [SortValue::Field(FieldValue::Number(-5.0))];
        let text = [SortValue::Field(FieldValue::from("a"))];
        assert_eq!(compare_sort_values(&null, &number, &sort), Ordering::Less);
        assert_eq!(compare_sort_values(&number, &text, &sort), Ordering::Less);
    }
}
