//! Query model and statement synthesis.
//!
//! - **Criteria**: predicates on columns or JSON body fields (`Criterion`, `Criteria`)
//! - **Builder**: SELECT / INSERT text from `DocumentMeta` (`SqlBuilder`)
//! - **Value Conversion**: bound values and their SQL parameter types
//!
//! # Examples
//!
//! ```
//! use docdb::{Criteria, Criterion, DocumentMeta, SqlBuilder};
//!
//! let meta = DocumentMeta::new("accounts", "data", "id", &["auto:record_id"]);
//! let criteria = Criteria::new().with(Criterion::json_field("data", "owner", "ana"));
//!
//! assert_eq!(
//!     SqlBuilder::create_sql_select(&meta, Some(&criteria)),
//!     "SELECT data  , record_id FROM accounts  WHERE data->>'owner'=?"
//! );
//! ```

pub mod builder;
pub mod criteria;
pub mod value_conversion;

pub use builder::SqlBuilder;
pub use criteria::{Criteria, Criterion, Order, OrderBy};
pub use value_conversion::{Jsonb, SqlParam, SqlType, Value};
