use crate::bridge::EngineError;
use crate::database::column::ColumnType;
use crate::database::scalar::Scalar;
use std::cmp::Ordering;

/// Aggregate functions the in-memory engine evaluates.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Aggregate {
    Any,
    And,
    Avg,
    Count,
    DistinctCount,
    Dominant,
    FirstByIndex,
    High,
    LastByIndex,
    Low,
    Median,
    Or,
    Sum,
    SumAbs,
    Unique,
}

impl Aggregate {
    pub(crate) fn parse(name: &str) -> Result<Self, EngineError> {
        match name {
            "any" => Ok(Self::Any),
            "and" => Ok(Self::And),
            "avg" | "mean" => Ok(Self::Avg),
            "count" => Ok(Self::Count),
            "distinct count" => Ok(Self::DistinctCount),
            "dominant" => Ok(Self::Dominant),
            "first by index" => Ok(Self::FirstByIndex),
            "high" => Ok(Self::High),
            "last by index" | "last" => Ok(Self::LastByIndex),
            "low" => Ok(Self::Low),
            "median" => Ok(Self::Median),
            "or" => Ok(Self::Or),
            "sum" => Ok(Self::Sum),
            "sum abs" => Ok(Self::SumAbs),
            "unique" => Ok(Self::Unique),
            _ => Err(EngineError::UnsupportedAggregate(name.to_owned())),
        }
    }

    /// Aggregate applied when the configuration names none.
    pub(crate) fn default_for(kind: ColumnType) -> Self {
        if kind.is_numeric() {
            Self::Sum
        } else {
            Self::Count
        }
    }

    /// Type of the aggregated values of a column of type `kind`.
    pub(crate) fn output_kind(&self, kind: ColumnType) -> ColumnType {
        match self {
            Self::Count | Self::DistinctCount => ColumnType::Integer,
            Self::Avg | Self::Median => ColumnType::Float,
            Self::And | Self::Or => ColumnType::Boolean,
            _ => kind,
        }
    }

    /// Folds the cells of one group, given in row order.
    pub(crate) fn apply(&self, kind: ColumnType, cells: &[&Scalar]) -> Scalar {
        let present = || cells.iter().copied().filter(|cell| !cell.is_null());
        match self {
            Self::Any => present().next().cloned().unwrap_or(Scalar::Null),
            Self::And => Scalar::Boolean(present().all(|cell| matches!(cell, Scalar::Boolean(true)))),
            Self::Or => Scalar::Boolean(present().any(|cell| matches!(cell, Scalar::Boolean(true)))),
            Self::Count => Scalar::Integer(present().count() as i64),
            Self::DistinctCount => Scalar::Integer(distinct(present()).len() as i64),
            Self::Dominant => dominant(present()),
            Self::FirstByIndex => cells.first().map(|cell| (*cell).clone()).unwrap_or(Scalar::Null),
            Self::LastByIndex => cells.last().map(|cell| (*cell).clone()).unwrap_or(Scalar::Null),
            Self::High => present()
                .max_by(|x, y| x.total_cmp(y))
                .cloned()
                .unwrap_or(Scalar::Null),
            Self::Low => present()
                .min_by(|x, y| x.total_cmp(y))
                .cloned()
                .unwrap_or(Scalar::Null),
            Self::Sum => sum(kind, present(), false),
            Self::SumAbs => sum(kind, present(), true),
            Self::Avg => {
                let values: Vec<f64> = present().filter_map(Scalar::as_f64).collect();
                if values.is_empty() {
                    Scalar::Null
                } else {
                    Scalar::Float(values.iter().sum::<f64>() / values.len() as f64)
                }
            }
            Self::Median => {
                let mut values: Vec<f64> = present().filter_map(Scalar::as_f64).collect();
                values.sort_by(f64::total_cmp);
                let middle = values.len() / 2;
                match values.len() {
                    0 => Scalar::Null,
                    len if len % 2 == 1 => Scalar::Float(values[middle]),
                    _ => Scalar::Float((values[middle - 1] + values[middle]) / 2.0),
                }
            }
            Self::Unique => {
                let values = distinct(present());
                match values.as_slice() {
                    [value] => (*value).clone(),
                    _ => Scalar::Null,
                }
            }
        }
    }
}

/// Integer columns sum exactly and fall back to a float sum once `i64` overflows.
fn sum<'a>(kind: ColumnType, cells: impl Iterator<Item = &'a Scalar>, abs: bool) -> Scalar {
    let cells: Vec<&Scalar> = cells.collect();
    if kind == ColumnType::Integer {
        let total = cells.iter().try_fold(0_i64, |total, cell| match cell {
            Scalar::Integer(value) => total.checked_add(if abs { value.checked_abs()? } else { *value }),
            _ => Some(total),
        });
        if let Some(total) = total {
            return Scalar::Integer(total);
        }
    }
    Scalar::Float(
        cells
            .iter()
            .filter_map(|cell| cell.as_f64())
            .map(|value| if abs { value.abs() } else { value })
            .sum(),
    )
}

/// Distinct values in first-seen order.
fn distinct<'a>(cells: impl Iterator<Item = &'a Scalar>) -> Vec<&'a Scalar> {
    let mut values: Vec<&Scalar> = Vec::new();
    for cell in cells {
        if !values.iter().any(|value| value.total_cmp(cell) == Ordering::Equal) {
            values.push(cell);
        }
    }
    values
}

/// Most frequent value; ties go to the value seen first.
fn dominant<'a>(cells: impl Iterator<Item = &'a Scalar>) -> Scalar {
    let mut counts: Vec<(&Scalar, usize)> = Vec::new();
    for cell in cells {
        match counts.iter_mut().find(|(value, _)| value.total_cmp(cell) == Ordering::Equal) {
            Some((_, count)) => *count += 1,
            None => counts.push((cell, 1)),
        }
    }
    let mut best: Option<(&Scalar, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, most)| count > most) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.clone()).unwrap_or(Scalar::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(name: &str, kind: ColumnType, cells: &[Scalar]) -> Scalar {
        let cells: Vec<&Scalar> = cells.iter().collect();
        Aggregate::parse(name).unwrap().apply(kind, &cells)
    }

    #[test]
    fn numeric_aggregates() {
        let cells = [Scalar::Integer(3), Scalar::Null, Scalar::Integer(-1), Scalar::Integer(4)];
        assert_eq!(apply("sum", ColumnType::Integer, &cells), Scalar::Integer(6));
        assert_eq!(apply("sum abs", ColumnType::Integer, &cells), Scalar::Integer(8));
        assert_eq!(apply("count", ColumnType::Integer, &cells), Scalar::Integer(3));
        assert_eq!(apply("avg", ColumnType::Integer, &cells), Scalar::Float(2.0));
        assert_eq!(apply("median", ColumnType::Integer, &cells), Scalar::Float(3.0));
        assert_eq!(apply("high", ColumnType::Integer, &cells), Scalar::Integer(4));
        assert_eq!(apply("low", ColumnType::Integer, &cells), Scalar::Integer(-1));
        assert_eq!(apply("first by index", ColumnType::Integer, &cells), Scalar::Integer(3));
        assert_eq!(apply("last", ColumnType::Integer, &cells), Scalar::Integer(4));
        assert_eq!(apply("sum", ColumnType::Float, &[Scalar::Float(0.5), Scalar::Float(0.25)]), Scalar::Float(0.75));
    }

    #[test]
    fn integer_overflow_falls_back_to_float() {
        let max = [Scalar::Integer(i64::MAX), Scalar::Integer(1)];
        assert_eq!(apply("sum", ColumnType::Integer, &max), Scalar::Float(i64::MAX as f64 + 1.0));
        let min = [Scalar::Integer(i64::MIN)];
        assert_eq!(apply("sum", ColumnType::Integer, &min), Scalar::Integer(i64::MIN));
        assert_eq!(apply("sum abs", ColumnType::Integer, &min), Scalar::Float(-(i64::MIN as f64)));
    }

    #[test]
    fn value_aggregates() {
        let s = |text: &str| Scalar::String(text.to_owned());
        let cells = [s("x"), s("y"), s("y"), Scalar::Null];
        assert_eq!(apply("distinct count", ColumnType::String, &cells), Scalar::Integer(2));
        assert_eq!(apply("dominant", ColumnType::String, &cells), s("y"));
        assert_eq!(apply("any", ColumnType::String, &cells), s("x"));
        assert_eq!(apply("unique", ColumnType::String, &cells), Scalar::Null);
        assert_eq!(apply("unique", ColumnType::String, &[s("x"), s("x")]), s("x"));
        assert_eq!(apply("and", ColumnType::Boolean, &[Scalar::Boolean(true), Scalar::Boolean(false)]), Scalar::Boolean(false));
        assert_eq!(apply("or", ColumnType::Boolean, &[Scalar::Boolean(true), Scalar::Boolean(false)]), Scalar::Boolean(true));
    }

    #[test]
    fn defaults_and_output_types() {
        assert_eq!(Aggregate::default_for(ColumnType::Float), Aggregate::Sum);
        assert_eq!(Aggregate::default_for(ColumnType::Date), Aggregate::Count);
        assert_eq!(Aggregate::Count.output_kind(ColumnType::String), ColumnType::Integer);
        assert_eq!(Aggregate::Sum.output_kind(ColumnType::Integer), ColumnType::Integer);
        assert_eq!(Aggregate::Avg.output_kind(ColumnType::Integer), ColumnType::Float);
        assert!(Aggregate::parse("pct sum parent").is_err());
    }
}
