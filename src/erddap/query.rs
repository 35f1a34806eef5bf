//! Query construction for griddap and tabledap requests.
//!
//! Griddap subsets every dimension positionally with `[(start):stride:(stop)]`.
//! Dimensions the caller leaves out span their full `actual_range`. Tabledap
//! takes a variable list followed by `&`-separated constraints and filters.

use std::collections::BTreeMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use super::{DatasetInfo, DatasetKind};
use crate::{Error, Result};

/// Characters escaped inside one query part. `&` is escaped too; callers join
/// the encoded parts with a literal `&`.
const QUERY_PART: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b']')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^')
    .add(b'`');

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Fields {
    /// Every declared variable.
    #[default]
    All,
    /// No variables: only the dimension values (griddap) or no variable list (tabledap).
    None,
    Only(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stride {
    Scalar(u32),
    /// One stride per dimension, in dimension order.
    PerDimension(Vec<u32>),
}

impl Default for Stride {
    fn default() -> Self {
        Stride::Scalar(1)
    }
}

/// Sparse dimension constraints for a griddap request.
#[derive(Debug, Clone, Default)]
pub struct GridQuery {
    pub ranges: BTreeMap<String, (String, String)>,
    pub fields: Fields,
    pub stride: Stride,
}

impl GridQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn range(mut self, dimension: &str, start: impl ToString, stop: impl ToString) -> Self {
        self.ranges
            .insert(dimension.to_string(), (start.to_string(), stop.to_string()));
        self
    }

    pub fn fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    pub fn stride(mut self, stride: Stride) -> Self {
        self.stride = stride;
        self
    }
}

/// `[(start):stride:(stop)]`
pub fn dimension_arg(start: &str, stride: u32, stop: &str) -> String {
    format!("[({}):{}:({})]", start, stride, stop)
}

/// `name[(start):stride:(stop)]`
pub fn named_dimension_arg(name: &str, start: &str, stride: u32, stop: &str) -> String {
    format!("{}{}", name, dimension_arg(start, stride, stop))
}

fn resolve_strides(stride: &Stride, dimensions: usize) -> Result<Vec<u32>> {
    let strides = match stride {
        Stride::Scalar(s) => vec![*s; dimensions],
        Stride::PerDimension(v) if v.len() == dimensions => v.clone(),
        Stride::PerDimension(v) => {
            return Err(Error::query(format!(
                "stride has {} values but the dataset has {} dimensions",
                v.len(),
                dimensions
            )))
        }
    };
    if strides.iter().any(|&s| s == 0) {
        return Err(Error::query("stride must be at least 1"));
    }
    Ok(strides)
}

fn check_known(names: &[String], known: impl Fn(&str) -> bool, what: &str, dataset_id: &str) -> Result<()> {
    let unknown: Vec<&str> = names
        .iter()
        .filter(|n| !known(n.as_str()))
        .map(String::as_str)
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(Error::query(format!(
            "{} not in dataset {}: {}",
            what,
            dataset_id,
            unknown.join(", ")
        )))
    }
}

/// Builds the unencoded griddap query for `info`.
pub fn build_grid_query(info: &DatasetInfo, query: &GridQuery) -> Result<String> {
    if info.kind != DatasetKind::Grid {
        return Err(Error::query(format!("{} is not a griddap dataset", info.dataset_id)));
    }

    let requested: Vec<String> = query.ranges.keys().cloned().collect();
    check_known(&requested, |n| info.is_dimension(n), "dimensions", &info.dataset_id)?;
    let strides = resolve_strides(&query.stride, info.dimensions.len())?;

    let mut fragments = Vec::with_capacity(info.dimensions.len());
    for (dimension, stride) in info.dimensions.iter().zip(strides) {
        let (start, stop) = match query.ranges.get(dimension) {
            Some(range) => range.clone(),
            None => info.query_range(dimension).ok_or_else(|| {
                Error::query(format!(
                    "no range given for dimension {} and the dataset declares no actual_range",
                    dimension
                ))
            })?,
        };
        fragments.push((dimension.as_str(), start, stride, stop));
    }

    let dimension_args: String = fragments
        .iter()
        .map(|(_, start, stride, stop)| dimension_arg(start, *stride, stop))
        .collect();

    let variables: Vec<String> = match &query.fields {
        Fields::All => info.variables.clone(),
        Fields::Only(fields) => {
            check_known(fields, |n| info.is_variable(n), "fields", &info.dataset_id)?;
            fields.clone()
        }
        Fields::None => {
            return Ok(fragments
                .iter()
                .map(|(name, start, stride, stop)| named_dimension_arg(name, start, *stride, stop))
                .collect::<Vec<_>>()
                .join(","));
        }
    };

    Ok(variables
        .iter()
        .map(|v| format!("{}{}", v, dimension_args))
        .collect::<Vec<_>>()
        .join(","))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    /// Regular expression match, `=~`.
    Regex,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Regex => "=~",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
        }
    }

    /// Parses an operator at the start of `s`, longest match first.
    pub fn split_prefix(s: &str) -> Option<(Op, &str)> {
        [
            Op::Ne,
            Op::Regex,
            Op::Le,
            Op::Ge,
            Op::Eq,
            Op::Lt,
            Op::Gt,
        ]
        .into_iter()
        .find_map(|op| s.strip_prefix(op.as_str()).map(|rest| (op, rest)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub variable: String,
    pub op: Op,
    pub value: String,
}

impl Constraint {
    pub fn new(variable: &str, op: Op, value: impl ToString) -> Self {
        Self {
            variable: variable.to_string(),
            op,
            value: value.to_string(),
        }
    }

    /// Parses `variable<op>value`, e.g. `time>=2020-01-01`.
    pub fn parse(s: &str) -> Result<Self> {
        let idx = s
            .find(|c| matches!(c, '=' | '!' | '<' | '>'))
            .ok_or_else(|| Error::query(format!("no operator in constraint {:?}", s)))?;
        let (variable, rest) = s.split_at(idx);
        let (op, value) = Op::split_prefix(rest)
            .ok_or_else(|| Error::query(format!("bad operator in constraint {:?}", s)))?;
        if variable.trim().is_empty() {
            return Err(Error::query(format!("no variable in constraint {:?}", s)));
        }
        Ok(Constraint::new(variable.trim(), op, value.trim()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderBy {
    Asc(Vec<String>),
    Max(Vec<String>),
    Min(Vec<String>),
    MinMax(Vec<String>),
}

impl OrderBy {
    fn parts(&self) -> (&'static str, &[String]) {
        match self {
            OrderBy::Asc(v) => ("orderBy", v),
            OrderBy::Max(v) => ("orderByMax", v),
            OrderBy::Min(v) => ("orderByMin", v),
            OrderBy::MinMax(v) => ("orderByMinMax", v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    Udunits,
    Ucum,
}

/// Variable selection, constraints and filters for a tabledap request.
#[derive(Debug, Clone, Default)]
pub struct TableQuery {
    pub fields: Fields,
    pub constraints: Vec<Constraint>,
    pub distinct: bool,
    pub order_by: Vec<OrderBy>,
    pub units: Option<Units>,
}

impl TableQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    pub fn constraint(mut self, variable: &str, op: Op, value: impl ToString) -> Self {
        self.constraints.push(Constraint::new(variable, op, value));
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn units(mut self, units: Units) -> Self {
        self.units = Some(units);
        self
    }
}

fn quote(value: &str) -> String {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        value.to_string()
    } else {
        format!("\"{}\"", value.replace('"', "\\\""))
    }
}

/// Builds the unencoded tabledap query parts: the variable list first (possibly
/// empty), then one part per constraint and filter.
pub fn build_table_query(info: &DatasetInfo, query: &TableQuery) -> Result<Vec<String>> {
    if info.kind != DatasetKind::Table {
        return Err(Error::query(format!("{} is not a tabledap dataset", info.dataset_id)));
    }

    let variable_list = match &query.fields {
        Fields::All | Fields::None => String::new(),
        Fields::Only(fields) => {
            check_known(fields, |n| info.is_variable(n), "fields", &info.dataset_id)?;
            fields.join(",")
        }
    };
    let mut parts = vec![variable_list];

    let constrained: Vec<String> = query.constraints.iter().map(|c| c.variable.clone()).collect();
    check_known(&constrained, |n| info.is_variable(n), "constraint variables", &info.dataset_id)?;

    for c in &query.constraints {
        let is_string = info.data_type(&c.variable) == Some("String");
        let value = if is_string || c.op == Op::Regex {
            quote(&c.value)
        } else {
            c.value.clone()
        };
        parts.push(format!("{}{}{}", c.variable, c.op.as_str(), value));
    }

    if query.distinct {
        parts.push("distinct()".to_string());
    }

    for order in &query.order_by {
        let (function, variables) = order.parts();
        check_known(variables, |n| info.is_variable(n), "orderBy variables", &info.dataset_id)?;
        parts.push(format!("{}(\"{}\")", function, variables.join(",")));
    }

    match query.units {
        Some(Units::Ucum) => parts.push("units(\"UCUM\")".to_string()),
        Some(Units::Udunits) => parts.push("units(\"UDUNITS\")".to_string()),
        None => {}
    }

    Ok(parts)
}

/// Percent-encodes one query part.
pub fn encode_part(part: &str) -> String {
    utf8_percent_encode(part, QUERY_PART).to_string()
}

/// Encodes each part and joins them with `&`. Drops a leading empty variable
/// list when nothing follows it.
pub fn encode_parts(parts: &[String]) -> String {
    if parts.len() == 1 && parts[0].is_empty() {
        return String::new();
    }
    parts.iter().map(|p| encode_part(p)).collect::<Vec<_>>().join("&")
}

// -- Tests -------------------------------------------------------------------
