//! Predicate model: [`Criterion`] and [`Criteria`].
//!
//! A criterion renders one SQL boolean fragment with a single `?` placeholder
//! and carries the value bound to it. `Criteria` is an ordered conjunction of
//! criteria. The order criteria are added in is both the order of the rendered
//! fragments and the order parameters are bound in, and each criterion is
//! assigned its placeholder position when it is added.

use crate::error::TypeMappingError;
use crate::query::value_conversion::{SqlParam, Value};

/// A single predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// Equality on a relational column: `<column>=?`
    Column { column: String, value: Value },
    /// Text equality on a field of the JSON body: `<column>->>'<field>'=?`
    JsonField { column: String, field: String, value: Value },
}

impl Criterion {
    pub fn column(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Criterion::Column {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn json_field(column: impl Into<String>, field: impl Into<String>, value: impl Into<Value>) -> Self {
        Criterion::JsonField {
            column: column.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    /// Column the predicate reads from (the JSON column for field predicates)
    pub fn column_name(&self) -> &str {
        match self {
            Criterion::Column { column, .. } | Criterion::JsonField { column, .. } => column,
        }
    }

    /// JSON field name, for field predicates
    pub fn field(&self) -> Option<&str> {
        match self {
            Criterion::Column { .. } => None,
            Criterion::JsonField { field, .. } => Some(field),
        }
    }

    pub fn value(&self) -> &Value {
        match self {
            Criterion::Column { value, .. } | Criterion::JsonField { value, .. } => value,
        }
    }

    pub fn to_sql_string(&self) -> String {
        match self {
            Criterion::Column { column, .. } => format!("{column}=?"),
            Criterion::JsonField { column, field, .. } => format!("{column}->>'{field}'=?"),
        }
    }
}

/// Sort direction for an ordering term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn to_sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// An `ORDER BY` term on a column or a JSON body field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderBy {
    Column { column: String, order: Order },
    JsonField { column: String, field: String, order: Order },
}

impl OrderBy {
    pub fn column(column: impl Into<String>, order: Order) -> Self {
        OrderBy::Column {
            column: column.into(),
            order,
        }
    }

    pub fn json_field(column: impl Into<String>, field: impl Into<String>, order: Order) -> Self {
        OrderBy::JsonField {
            column: column.into(),
            field: field.into(),
            order,
        }
    }

    pub fn to_sql_string(&self) -> String {
        match self {
            OrderBy::Column { column, order } => format!("{column} {}", order.to_sql()),
            OrderBy::JsonField { column, field, order } => {
                format!("{column}->>'{field}' {}", order.to_sql())
            }
        }
    }
}

/// A criterion together with the placeholder it was assigned
#[derive(Debug, Clone, PartialEq)]
struct Placed {
    position: usize,
    criterion: Criterion,
}

/// Ordered conjunction of criteria
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    criteria: Vec<Placed>,
    order_by: Vec<OrderBy>,
}

impl Criteria {
    /// Token joining predicate fragments
    pub const SQL_STMT_DELIM: &'static str = " AND ";

    pub fn new() -> Self {
        Self::default()
    }

    /// Append a criterion; it takes the next placeholder position
    pub fn add(&mut self, criterion: Criterion) -> &mut Self {
        let position = self.criteria.len() + 1;
        self.criteria.push(Placed { position, criterion });
        self
    }

    pub fn with(mut self, criterion: Criterion) -> Self {
        self.add(criterion);
        self
    }

    /// Append an ordering term
    pub fn order_by(mut self, term: OrderBy) -> Self {
        self.order_by.push(term);
        self
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Criterion> {
        self.criteria.iter().map(|p| &p.criterion)
    }

    /// Criteria with the 1-based placeholder each was assigned on `add`
    pub fn placeholders(&self) -> impl Iterator<Item = (usize, &Criterion)> {
        self.criteria.iter().map(|p| (p.position, &p.criterion))
    }

    pub fn ordering(&self) -> &[OrderBy] {
        &self.order_by
    }

    /// Predicate fragments joined by [`Criteria::SQL_STMT_DELIM`]
    pub fn to_sql_string(&self) -> String {
        self.iter()
            .map(Criterion::to_sql_string)
            .collect::<Vec<_>>()
            .join(Self::SQL_STMT_DELIM)
    }

    /// Bound values, in fragment order
    pub fn values(&self) -> Vec<&Value> {
        self.iter().map(Criterion::value).collect()
    }

    /// Convert every value into a bind parameter, in placeholder order.
    ///
    /// Each parameter lands in the slot of the placeholder its criterion was
    /// assigned. Fails on the first value kind that has no parameter type.
    pub fn bind(&self) -> Result<Vec<SqlParam>, TypeMappingError> {
        let mut slots: Vec<Option<SqlParam>> = vec![None; self.criteria.len()];
        for (position, criterion) in self.placeholders() {
            let param = SqlParam::try_from(criterion.value())?;
            if let Some(slot) = position.checked_sub(1).and_then(|i| slots.get_mut(i)) {
                *slot = Some(param);
            }
        }
        Ok(slots.into_iter().flatten().collect())
    }
}

impl FromIterator<Criterion> for Criteria {
    fn from_iter<I: IntoIterator<Item = Criterion>>(iter: I) -> Self {
        let mut criteria = Criteria::new();
        for criterion in iter {
            criteria.add(criterion);
        }
        criteria
    }
}

impl Extend<Criterion> for Criteria {
    fn extend<I: IntoIterator<Item = Criterion>>(&mut self, iter: I) {
        for criterion in iter {
            self.add(criterion);
        }
    }
}
