//! Expression analyzer
//!
//! Dispatches on `pg_query::protobuf::NodeEnum`, computing a type/nullability
//! tuple for every expression node in the parse tree.

use crate::error::AnalyzeError;
use crate::scope::Scope;
use pg_query::protobuf::{a_const::Val as AConstVal, Node, NodeEnum};

/// The result of analyzing one expression node.
#[derive(Debug, Clone, Default)]
pub struct ParsedExpression {
    pub sql_type: String,
    pub nullable: bool,
    pub name: Option<String>,
    pub constant_value: Option<String>,
    pub branches: Vec<ParsedExpression>,
    pub set_variants: Vec<ParsedExpression>,
}

impl ParsedExpression {
    pub fn new(sql_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            sql_type: sql_type.into(),
            nullable,
            ..Default::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn constant(mut self, value: impl Into<String>) -> Self {
        self.constant_value = Some(value.into());
        self
    }
}

fn node_enum(node: &Node) -> Result<&NodeEnum, AnalyzeError> {
    node.node
        .as_ref()
        .ok_or_else(|| AnalyzeError::Unsupported("empty node".to_string()))
}

/// Deparse `node` for use in an error message, using a "parse a trivial
/// statement first, then splice" trick so a bare expression node can be
/// deparsed without tripping `libpg_query`'s internal version check.
pub fn deparse_for_error(node: &Node) -> String {
    let placeholder = pg_query::parse("SELECT NULL");
    let Ok(mut result) = placeholder else {
        return "<expression>".to_string();
    };
    if let Some(stmt) = result.protobuf.stmts.first_mut() {
        if let Some(raw) = stmt.stmt.as_mut() {
            *raw = Box::new(node.clone());
        }
    }
    pg_query::deparse(&result.protobuf).unwrap_or_else(|_| "<expression>".to_string())
}

/// Analyze one expression node against `scope`, returning its computed type.
pub fn analyze_expr(node: &Node, scope: &Scope) -> Result<ParsedExpression, AnalyzeError> {
    match node_enum(node)? {
        NodeEnum::AConst(c) => Ok(analyze_const(c)),
        NodeEnum::TypeCast(cast) => analyze_type_cast(cast, scope),
        NodeEnum::ColumnRef(col_ref) => analyze_column_ref(col_ref, scope),
        NodeEnum::ParamRef(_) => Ok(ParsedExpression::new("any", true)),
        NodeEnum::SqlvalueFunction(f) => Ok(analyze_sql_value_function(f.op)),
        NodeEnum::BoolExpr(expr) => analyze_bool_expr(expr, scope),
        NodeEnum::NullTest(test) => analyze_null_test(test, scope),
        NodeEnum::BooleanTest(_) => Ok(ParsedExpression::new("bool", false)),
        NodeEnum::AExpr(expr) => analyze_a_expr(expr, scope),
        NodeEnum::CaseExpr(expr) => analyze_case_expr(expr, scope),
        NodeEnum::CoalesceExpr(expr) => analyze_coalesce(expr, scope),
        NodeEnum::AArrayExpr(expr) => analyze_array_ctor(expr, scope),
        NodeEnum::AIndirection(expr) => analyze_indirection(expr, scope),
        NodeEnum::MinMaxExpr(expr) => analyze_minmax(expr, scope),
        NodeEnum::List(list) => analyze_list(list, scope),
        NodeEnum::FuncCall(call) => analyze_func_call(call, scope),
        NodeEnum::SubLink(link) => analyze_sublink(link, scope),
        other => Err(AnalyzeError::Unsupported(format!("{other:?}"))),
    }
}

fn analyze_const(c: &pg_query::protobuf::AConst) -> ParsedExpression {
    if c.isnull {
        return ParsedExpression::new("null", true);
    }
    match &c.val {
        Some(AConstVal::Ival(i)) => {
            ParsedExpression::new("int4", false).constant(i.ival.to_string())
        }
        Some(AConstVal::Fval(f)) => ParsedExpression::new("float4", false).constant(f.fval.clone()),
        Some(AConstVal::Sval(s)) => {
            ParsedExpression::new("text", false).constant(format!("\"{}\"", s.sval))
        }
        Some(AConstVal::Boolval(b)) => {
            ParsedExpression::new("bool", false).constant(b.boolval.to_string())
        }
        Some(AConstVal::Bsval(b)) => ParsedExpression::new("bit", false).constant(b.bsval.clone()),
        None => ParsedExpression::new("null", true),
    }
}

fn analyze_type_cast(
    cast: &pg_query::protobuf::TypeCast,
    scope: &Scope,
) -> Result<ParsedExpression, AnalyzeError> {
    let arg = cast
        .arg
        .as_ref()
        .ok_or_else(|| AnalyzeError::Unsupported("cast with no argument".to_string()))?;
    let mut inner = analyze_expr(arg, scope)?;

    let Some(type_name) = cast.type_name.as_ref() else {
        return Ok(inner);
    };
    let mut sql_type = type_name
        .names
        .last()
        .and_then(|n| match n.node.as_ref() {
            Some(NodeEnum::String(s)) => Some(s.sval.clone()),
            _ => None,
        })
        .unwrap_or_else(|| "any".to_string());
    if !type_name.array_bounds.is_empty() {
        sql_type.push_str("[]");
    }

    // `'t'::bool` / `'f'::bool` narrow to a boolean literal, mirroring how
    // constant-folding would see it at the source level.
    if sql_type == "bool" {
        if let Some(value) = inner.constant_value.as_deref() {
            let literal = value.trim_matches('"');
            if literal == "t" {
                return Ok(ParsedExpression::new("bool", false).constant("true"));
            }
            if literal == "f" {
                return Ok(ParsedExpression::new("bool", false).constant("false"));
            }
        }
    }

    inner.sql_type = sql_type;
    Ok(inner)
}

fn analyze_column_ref(
    col_ref: &pg_query::protobuf::ColumnRef,
    scope: &Scope,
) -> Result<ParsedExpression, AnalyzeError> {
    let fields: Vec<&str> = col_ref
        .fields
        .iter()
        .filter_map(|f| match f.node.as_ref() {
            Some(NodeEnum::String(s)) => Some(s.sval.as_str()),
            Some(NodeEnum::AStar(_)) => Some("*"),
            _ => None,
        })
        .collect();

    match fields.as_slice() {
        [col] if *col != "*" => {
            let column = scope
                .resolve_column(col)
                .ok_or_else(|| AnalyzeError::UnknownColumn((*col).to_string()))?;
            Ok(ParsedExpression::new(column.sql_type, column.nullable).named(*col))
        }
        [table, col] if *col != "*" => {
            let column = scope
                .resolve_qualified_column(table, col)
                .ok_or_else(|| AnalyzeError::UnknownColumn(format!("{table}.{col}")))?;
            Ok(ParsedExpression::new(column.sql_type, column.nullable).named(*col))
        }
        [table, "*"] => {
            let bound = scope
                .get_table(table)
                .ok_or_else(|| AnalyzeError::UnknownTable((*table).to_string()))?;
            Ok(ParsedExpression::new("any", bound.nullable))
        }
        ["*"] => Ok(ParsedExpression::new("any", false)),
        _ => Err(AnalyzeError::Unsupported(
            "fully qualified schema.table.column references".to_string(),
        )),
    }
}

fn analyze_sql_value_function(op: i32) -> ParsedExpression {
    use pg_query::protobuf::SqlValueFunctionOp as Op;
    let sql_type = match Op::try_from(op).unwrap_or(Op::Undefined) {
        Op::SvfopCurrentDate => "date",
        Op::SvfopCurrentTime | Op::SvfopCurrentTimeN => "timetz",
        Op::SvfopCurrentTimestamp | Op::SvfopCurrentTimestampN => "timestamptz",
        Op::SvfopLocaltime | Op::SvfopLocaltimeN => "time",
        Op::SvfopLocaltimestamp | Op::SvfopLocaltimestampN => "timestamp",
        Op::SvfopCurrentRole
        | Op::SvfopCurrentUser
        | Op::SvfopUser
        | Op::SvfopSessionUser
        | Op::SvfopCurrentCatalog
        | Op::SvfopCurrentSchema => "text",
        _ => "any",
    };
    ParsedExpression::new(sql_type, false)
}

fn analyze_bool_expr(
    expr: &pg_query::protobuf::BoolExpr,
    scope: &Scope,
) -> Result<ParsedExpression, AnalyzeError> {
    let mut nullable = false;
    for arg in &expr.args {
        nullable |= analyze_expr(arg, scope)?.nullable;
    }
    Ok(ParsedExpression::new("bool", nullable))
}

fn analyze_null_test(
    test: &pg_query::protobuf::NullTest,
    scope: &Scope,
) -> Result<ParsedExpression, AnalyzeError> {
    if let Some(arg) = test.arg.as_ref() {
        analyze_expr(arg, scope)?;
    }
    Ok(ParsedExpression::new("bool", false))
}

fn operator_name(expr: &pg_query::protobuf::AExpr) -> Option<&str> {
    expr.name.last().and_then(|n| match n.node.as_ref() {
        Some(NodeEnum::String(s)) => Some(s.sval.as_str()),
        _ => None,
    })
}

fn analyze_a_expr(
    expr: &pg_query::protobuf::AExpr,
    scope: &Scope,
) -> Result<ParsedExpression, AnalyzeError> {
    use pg_query::protobuf::AExprKind;

    let lhs = expr
        .lexpr
        .as_ref()
        .map(|n| analyze_expr(n, scope))
        .transpose()?;
    let rhs = expr
        .rexpr
        .as_ref()
        .map(|n| analyze_expr(n, scope))
        .transpose()?;
    let nullable = lhs.as_ref().is_some_and(|l| l.nullable) || rhs.as_ref().is_some_and(|r| r.nullable);

    let kind = AExprKind::try_from(expr.kind).unwrap_or(AExprKind::AexprOp);
    match kind {
        AExprKind::AexprOpAny
        | AExprKind::AexprOpAll
        | AExprKind::AexprIn
        | AExprKind::AexprLike
        | AExprKind::AexprIlike
        | AExprKind::AexprSimilar
        | AExprKind::AexprBetween
        | AExprKind::AexprNotBetween
        | AExprKind::AexprBetweenSym
        | AExprKind::AexprNotBetweenSym => Ok(ParsedExpression::new("bool", nullable)),
        AExprKind::AexprDistinct | AExprKind::AexprNotDistinct => {
            Ok(ParsedExpression::new("bool", false))
        }
        // `NULLIF(a, b)`: type of `a`, always nullable regardless of either
        // operand's own nullability.
        AExprKind::AexprNullif => {
            let sql_type = lhs.map(|l| l.sql_type).unwrap_or_else(|| "any".to_string());
            Ok(ParsedExpression::new(sql_type, true))
        }
        AExprKind::AexprOp => analyze_binary_operator(operator_name(expr), lhs, rhs, nullable),
        _ => Ok(ParsedExpression::new("bool", nullable)),
    }
}

fn analyze_binary_operator(
    op: Option<&str>,
    lhs: Option<ParsedExpression>,
    rhs: Option<ParsedExpression>,
    nullable: bool,
) -> Result<ParsedExpression, AnalyzeError> {
    let op = op.ok_or_else(|| AnalyzeError::Unsupported("operator with no name".to_string()))?;

    // NULLIF is parsed as a FuncCall in PostgreSQL's grammar, not an AExpr;
    // comparisons below cover the remaining bool-returning operator family.
    if matches!(op, "=" | "<" | ">" | "<=" | ">=" | "<>" | "!=" | "@>" | "<@" | "?" | "?|" | "?&"
        | "@?" | "@@" | "&&" | "&<" | "&>" | "-|-" | "~*" | "!~" | "!~*")
    {
        return Ok(ParsedExpression::new("bool", nullable));
    }

    let lhs_type = lhs.as_ref().map(|e| e.sql_type.as_str()).unwrap_or("any");
    let rhs_type = rhs.as_ref().map(|e| e.sql_type.as_str()).unwrap_or("any");
    let is_date = |t: &str| t == "date";
    let is_interval = |t: &str| t == "interval";
    let is_time = |t: &str| matches!(t, "time" | "timetz");
    let is_timestamp = |t: &str| matches!(t, "timestamp" | "timestamptz");
    let is_numeric = |t: &str| {
        matches!(
            t,
            "int2" | "int4" | "int8" | "float4" | "float8" | "numeric" | "decimal"
        )
    };

    let sql_type = match op {
        "+" => {
            if is_date(lhs_type) && is_numeric(rhs_type) {
                "date".to_string()
            } else if is_date(lhs_type) && (is_time(rhs_type) || is_interval(rhs_type)) {
                "timestamp".to_string()
            } else if is_interval(lhs_type) && (is_time(rhs_type) || is_timestamp(rhs_type)) {
                rhs_type.to_string()
            } else {
                rhs_type.to_string()
            }
        }
        "-" => {
            if lhs_type == "json" || lhs_type == "jsonb" {
                lhs_type.to_string()
            } else if is_date(lhs_type) && is_date(rhs_type) {
                "int4".to_string()
            } else if is_date(lhs_type) && is_numeric(rhs_type) {
                "date".to_string()
            } else if is_date(lhs_type) && is_interval(rhs_type) {
                "timestamp".to_string()
            } else if is_time(lhs_type) && is_time(rhs_type) {
                "interval".to_string()
            } else if (is_time(lhs_type) || is_timestamp(lhs_type)) && is_interval(rhs_type) {
                lhs_type.to_string()
            } else if is_timestamp(lhs_type) && is_timestamp(rhs_type) {
                "interval".to_string()
            } else {
                rhs_type.to_string()
            }
        }
        "*" => {
            if (is_interval(lhs_type) && is_numeric(rhs_type))
                || (is_numeric(lhs_type) && is_interval(rhs_type))
            {
                "interval".to_string()
            } else {
                rhs_type.to_string()
            }
        }
        "/" => {
            if is_interval(lhs_type) && is_numeric(rhs_type) {
                "interval".to_string()
            } else {
                rhs_type.to_string()
            }
        }
        "<<" | ">>" => {
            if is_numeric(rhs_type) {
                lhs_type.to_string()
            } else {
                return Ok(ParsedExpression::new("bool", nullable));
            }
        }
        "~" => {
            if is_numeric(rhs_type) || rhs_type == "bit" || rhs_type == "varbit" {
                rhs_type.to_string()
            } else {
                return Ok(ParsedExpression::new("bool", nullable));
            }
        }
        "||" => {
            if lhs_type.ends_with("[]") || rhs_type.ends_with("[]") {
                if lhs_type.ends_with("[]") {
                    lhs_type.to_string()
                } else {
                    rhs_type.to_string()
                }
            } else if lhs_type == "text" || rhs_type == "text" {
                "text".to_string()
            } else {
                rhs_type.to_string()
            }
        }
        "&" | "|" | "#" | "->" | "#>" | "#-" => lhs_type.to_string(),
        "->>" | "#>>" => "text".to_string(),
        "%" | "^" | "|/" | "||/" | "@" => rhs_type.to_string(),
        _ => return Err(AnalyzeError::Unsupported(format!("operator {op}"))),
    };

    Ok(ParsedExpression::new(sql_type, nullable))
}

fn analyze_case_expr(
    expr: &pg_query::protobuf::CaseExpr,
    scope: &Scope,
) -> Result<ParsedExpression, AnalyzeError> {
    let mut branches = Vec::new();
    for when in &expr.args {
        if let Some(NodeEnum::CaseWhen(case_when)) = when.node.as_ref() {
            if let Some(result) = case_when.result.as_ref() {
                branches.push(analyze_expr(result, scope)?);
            }
        }
    }
    let has_else = expr.defresult.is_some();
    if let Some(default) = expr.defresult.as_ref() {
        branches.push(analyze_expr(default, scope)?);
    }

    let sql_type = branches
        .first()
        .map(|b| b.sql_type.clone())
        .unwrap_or_else(|| "any".to_string());
    let nullable = !has_else || branches.iter().any(|b| b.nullable);

    let mut result = ParsedExpression::new(sql_type, nullable);
    result.branches = branches;
    Ok(result)
}

fn analyze_coalesce(
    expr: &pg_query::protobuf::CoalesceExpr,
    scope: &Scope,
) -> Result<ParsedExpression, AnalyzeError> {
    let mut branches = Vec::new();
    for arg in &expr.args {
        let parsed = analyze_expr(arg, scope)?;
        let stop_here = !parsed.nullable;
        branches.push(parsed);
        if stop_here {
            break;
        }
    }

    let sql_type = branches
        .first()
        .map(|b| b.sql_type.clone())
        .unwrap_or_else(|| "any".to_string());
    let nullable = branches.iter().all(|b| b.nullable);

    let mut result = ParsedExpression::new(sql_type, nullable);
    result.branches = branches;
    Ok(result)
}

fn analyze_array_ctor(
    expr: &pg_query::protobuf::AArrayExpr,
    scope: &Scope,
) -> Result<ParsedExpression, AnalyzeError> {
    let element_type = expr
        .elements
        .first()
        .map(|e| analyze_expr(e, scope))
        .transpose()?
        .map(|p| p.sql_type)
        .unwrap_or_else(|| "any".to_string());
    Ok(ParsedExpression::new(format!("{element_type}[]"), false))
}

fn analyze_indirection(
    expr: &pg_query::protobuf::AIndirection,
    scope: &Scope,
) -> Result<ParsedExpression, AnalyzeError> {
    let arg = expr
        .arg
        .as_ref()
        .ok_or_else(|| AnalyzeError::Unsupported("indirection with no argument".to_string()))?;
    let base = analyze_expr(arg, scope)?;

    if expr.indirection.len() != 1 {
        return Err(AnalyzeError::Unsupported(
            "multi-dimensional array subscripting".to_string(),
        ));
    }

    if base.sql_type == "json" || base.sql_type == "jsonb" {
        return Ok(ParsedExpression::new("any", true));
    }

    let Some(element_type) = base.sql_type.strip_suffix("[]").map(str::to_string) else {
        return Err(AnalyzeError::Unsupported(
            "subscripting a non-array expression".to_string(),
        ));
    };

    match expr.indirection[0].node.as_ref() {
        Some(NodeEnum::AIndices(indices)) if indices.is_slice => {
            let mut nullable = base.nullable;
            if let Some(lo) = indices.lidx.as_ref() {
                nullable |= analyze_expr(lo, scope)?.nullable;
            }
            if let Some(hi) = indices.uidx.as_ref() {
                nullable |= analyze_expr(hi, scope)?.nullable;
            }
            Ok(ParsedExpression::new(base.sql_type, nullable))
        }
        _ => Ok(ParsedExpression::new(element_type, true)),
    }
}

fn analyze_minmax(
    expr: &pg_query::protobuf::MinMaxExpr,
    scope: &Scope,
) -> Result<ParsedExpression, AnalyzeError> {
    let mut parsed = Vec::new();
    for arg in &expr.args {
        parsed.push(analyze_expr(arg, scope)?);
    }
    let sql_type = parsed
        .first()
        .map(|p| p.sql_type.clone())
        .unwrap_or_else(|| "any".to_string());
    let nullable = !parsed.is_empty() && parsed.iter().all(|p| p.nullable);
    Ok(ParsedExpression::new(sql_type, nullable))
}

fn analyze_list(
    list: &pg_query::protobuf::List,
    scope: &Scope,
) -> Result<ParsedExpression, AnalyzeError> {
    let mut branches = Vec::new();
    for item in &list.items {
        branches.push(analyze_expr(item, scope)?);
    }
    let sql_type = branches
        .first()
        .map(|b| b.sql_type.clone())
        .unwrap_or_else(|| "any".to_string());
    let nullable = branches.iter().any(|b| b.nullable);
    let mut result = ParsedExpression::new(sql_type, nullable);
    result.branches = branches;
    Ok(result)
}

/// Result-type rule for a known function family.
enum FuncFamily {
    FirstArgShape,
    /// Regular aggregates (`sum`/`min`/`max`/`string_agg`/`array_agg`): type
    /// of the first arg, but *always* nullable since the aggregate can
    /// return null over an empty group, independent of the arg's own
    /// nullability.
    AggregateFirstArgShape,
    SecondArgShape,
    AlwaysNonNullInt8,
    /// Catch-all for an unrecognized function name: `any`, nullable.
    Unknown,
    Avg,
    Bool,
    Bytes,
    Fixed(&'static str),
    NullableFixed(&'static str),
}

fn classify_function(name: &str) -> FuncFamily {
    match name {
        "abs" | "ceil" | "ceiling" | "floor" | "round" | "trunc" | "lower" | "upper"
        | "substring" | "substr" | "trim" | "ltrim" | "rtrim" | "btrim" | "lpad" | "rpad"
        | "repeat" | "reverse" | "replace" | "regexp_replace" | "translate" | "md5" | "sha224"
        | "sha256" | "sha384" | "sha512" | "array_append" | "array_cat" | "array_remove"
        | "array_replace" => FuncFamily::FirstArgShape,
        "sum" | "min" | "max" | "string_agg" | "array_agg" => FuncFamily::AggregateFirstArgShape,
        "array_prepend" => FuncFamily::SecondArgShape,
        "count" | "currval" | "nextval" | "lastval" | "setval" | "rank" | "dense_rank"
        | "row_number" => FuncFamily::AlwaysNonNullInt8,
        "bool_and" | "bool_or" | "every" | "isfinite" | "starts_with" => FuncFamily::Bool,
        "convert_to" | "decode" => FuncFamily::Bytes,
        "avg" => FuncFamily::Avg,
        "array_position" => FuncFamily::NullableFixed("int4"),
        "length" | "array_length" | "array_lower" | "array_upper" | "array_ndims" | "ascii"
        | "bit_length" | "cardinality" | "char_length" | "character_length" | "chr"
        | "get_bit" | "get_byte" | "ntile" | "octet_length" | "position" | "scale" | "strpos"
        | "width_bucket" | "num_nulls" | "num_nonnulls" => FuncFamily::Fixed("int4"),
        "bit_count" => FuncFamily::Fixed("int8"),
        "make_date" | "to_date" => FuncFamily::Fixed("date"),
        "make_time" => FuncFamily::Fixed("time"),
        "make_timestamp" => FuncFamily::Fixed("timestamp"),
        "make_timestamptz" | "to_timestamp" | "now" | "clock_timestamp"
        | "statement_timestamp" | "transaction_timestamp" => FuncFamily::Fixed("timestamptz"),
        "date_bin" | "date_trunc" => FuncFamily::SecondArgShape,
        "timeofday" => FuncFamily::Fixed("text"),
        "concat" | "concat_ws" => FuncFamily::Fixed("text"),
        _ => FuncFamily::Unknown,
    }
}

fn analyze_func_call(
    call: &pg_query::protobuf::FuncCall,
    scope: &Scope,
) -> Result<ParsedExpression, AnalyzeError> {
    let name = call
        .funcname
        .last()
        .and_then(|n| match n.node.as_ref() {
            Some(NodeEnum::String(s)) => Some(s.sval.as_str()),
            _ => None,
        })
        .unwrap_or("");

    // `count(*)` has no argument nodes; treat separately.
    if name == "count" && call.args.is_empty() {
        return Ok(ParsedExpression::new("int8", false));
    }

    let mut args = Vec::new();
    for arg in &call.args {
        args.push(analyze_expr(arg, scope)?);
    }

    let any_nullable = args.iter().any(|a| a.nullable);
    let first = args.first().cloned();
    let second = args.get(1).cloned();

    Ok(match classify_function(name) {
        FuncFamily::FirstArgShape => {
            let (ty, null) = first
                .map(|a| (a.sql_type, a.nullable))
                .unwrap_or(("any".to_string(), true));
            ParsedExpression::new(ty, null)
        }
        FuncFamily::SecondArgShape => {
            let (ty, null) = second
                .map(|a| (a.sql_type, a.nullable))
                .unwrap_or(("any".to_string(), true));
            ParsedExpression::new(ty, null)
        }
        FuncFamily::AlwaysNonNullInt8 => ParsedExpression::new("int8", false),
        FuncFamily::AggregateFirstArgShape => {
            let ty = first.map(|a| a.sql_type).unwrap_or_else(|| "any".to_string());
            ParsedExpression::new(ty, true)
        }
        FuncFamily::Unknown => ParsedExpression::new("any", true),
        FuncFamily::Avg => {
            let ty = match first.as_ref().map(|a| a.sql_type.as_str()) {
                Some("interval") => "interval",
                Some("float8") => "float8",
                Some("float4") => "float8",
                _ => "numeric",
            };
            ParsedExpression::new(ty, true)
        }
        FuncFamily::Bool => ParsedExpression::new("bool", any_nullable),
        FuncFamily::Bytes => ParsedExpression::new("bytea", any_nullable),
        FuncFamily::Fixed(ty) => ParsedExpression::new(ty, any_nullable),
        FuncFamily::NullableFixed(ty) => ParsedExpression::new(ty, true),
    })
}

fn analyze_sublink(
    link: &pg_query::protobuf::SubLink,
    scope: &Scope,
) -> Result<ParsedExpression, AnalyzeError> {
    use pg_query::protobuf::SubLinkType as Kind;

    let subselect = link
        .subselect
        .as_ref()
        .ok_or_else(|| AnalyzeError::Unsupported("sublink with no subselect".to_string()))?;

    match Kind::try_from(link.sub_link_type).unwrap_or(Kind::ExprSublink) {
        Kind::ExistsSublink | Kind::RowcompareSublink => Ok(ParsedExpression::new("bool", false)),
        Kind::AnySublink | Kind::AllSublink => Ok(ParsedExpression::new("bool", true)),
        Kind::ExprSublink => {
            let inner = crate::statement::analyze_select_node(subselect, scope.catalog.clone(), &scope.default_schema)?;
            let mut col = inner
                .into_iter()
                .next()
                .unwrap_or_else(|| ParsedExpression::new("any", true));
            col.nullable = true;
            col.name = None;
            Ok(col)
        }
        Kind::ArraySublink => {
            let inner = crate::statement::analyze_select_node(subselect, scope.catalog.clone(), &scope.default_schema)?;
            let col = inner
                .into_iter()
                .next()
                .unwrap_or_else(|| ParsedExpression::new("any", false));
            Ok(ParsedExpression::new(format!("{}[]", col.sql_type), false))
        }
        _ => Ok(ParsedExpression::new("any", false)),
    }
}

/// Infer a target-list column name from a bare expression (used when no
/// explicit `AS alias` is given).
pub fn infer_name(node: &Node) -> Option<String> {
    match node_enum(node).ok()? {
        NodeEnum::ColumnRef(col_ref) => col_ref.fields.last().and_then(|f| match f.node.as_ref() {
            Some(NodeEnum::String(s)) => Some(s.sval.clone()),
            _ => None,
        }),
        _ => None,
    }
}

/// `true` if `node` is exactly a bare `*` column reference with no table
/// qualifier.
pub fn is_bare_star(node: &Node) -> bool {
    matches!(node.node.as_ref(), Some(NodeEnum::ColumnRef(c)) if matches!(
        c.fields.as_slice(),
        [f] if matches!(f.node.as_ref(), Some(NodeEnum::AStar(_)))
    ))
}

/// If `node` is `tbl.*`, return `tbl`.
pub fn qualified_star_table(node: &Node) -> Option<&str> {
    match node.node.as_ref()? {
        NodeEnum::ColumnRef(c) => match c.fields.as_slice() {
            [t, star]
                if matches!(star.node.as_ref(), Some(NodeEnum::AStar(_))) =>
            {
                match t.node.as_ref() {
                    Some(NodeEnum::String(s)) => Some(s.sval.as_str()),
                    _ => None,
                }
            }
            _ => None,
        },
        _ => None,
    }
}

/// One `$n` parameter reference found while scanning a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ParamRef {
    pub ordinal: i32,
}

/// Recursively collect every `$n` reference under `node`, in tree-walk order.
///
/// Covers the same expression node kinds the expression analyzer dispatches
/// on above, plus the structural nodes (`ResTarget`, `JoinExpr`) needed to
/// reach into target lists and join conditions.
pub fn collect_param_refs(node: &Node, out: &mut Vec<ParamRef>) {
    let Some(inner) = node.node.as_ref() else {
        return;
    };

    match inner {
        NodeEnum::ParamRef(p) => out.push(ParamRef { ordinal: p.number }),
        NodeEnum::TypeCast(tc) => {
            if let Some(arg) = &tc.arg {
                collect_param_refs(arg, out);
            }
        }
        NodeEnum::AExpr(expr) => {
            if let Some(lexpr) = &expr.lexpr {
                collect_param_refs(lexpr, out);
            }
            if let Some(rexpr) = &expr.rexpr {
                collect_param_refs(rexpr, out);
            }
        }
        NodeEnum::BoolExpr(be) => {
            for arg in &be.args {
                collect_param_refs(arg, out);
            }
        }
        NodeEnum::NullTest(nt) => {
            if let Some(arg) = &nt.arg {
                collect_param_refs(arg, out);
            }
        }
        NodeEnum::BooleanTest(bt) => {
            if let Some(arg) = &bt.arg {
                collect_param_refs(arg, out);
            }
        }
        NodeEnum::CaseExpr(ce) => {
            if let Some(arg) = &ce.arg {
                collect_param_refs(arg, out);
            }
            for when in &ce.args {
                collect_param_refs(when, out);
            }
            if let Some(def) = &ce.defresult {
                collect_param_refs(def, out);
            }
        }
        NodeEnum::CaseWhen(cw) => {
            if let Some(expr) = &cw.expr {
                collect_param_refs(expr, out);
            }
            if let Some(result) = &cw.result {
                collect_param_refs(result, out);
            }
        }
        NodeEnum::CoalesceExpr(ce) => {
            for arg in &ce.args {
                collect_param_refs(arg, out);
            }
        }
        NodeEnum::MinMaxExpr(mm) => {
            for arg in &mm.args {
                collect_param_refs(arg, out);
            }
        }
        NodeEnum::AArrayExpr(arr) => {
            for elem in &arr.elements {
                collect_param_refs(elem, out);
            }
        }
        NodeEnum::AIndirection(ind) => {
            if let Some(arg) = &ind.arg {
                collect_param_refs(arg, out);
            }
            for step in &ind.indirection {
                if let Some(NodeEnum::AIndices(indices)) = step.node.as_ref() {
                    if let Some(lo) = &indices.lidx {
                        collect_param_refs(lo, out);
                    }
                    if let Some(hi) = &indices.uidx {
                        collect_param_refs(hi, out);
                    }
                }
            }
        }
        NodeEnum::List(list) => {
            for item in &list.items {
                collect_param_refs(item, out);
            }
        }
        NodeEnum::FuncCall(fc) => {
            for arg in &fc.args {
                collect_param_refs(arg, out);
            }
        }
        NodeEnum::SubLink(sl) => {
            if let Some(test) = &sl.testexpr {
                collect_param_refs(test, out);
            }
        }
        NodeEnum::ResTarget(rt) => {
            if let Some(val) = &rt.val {
                collect_param_refs(val, out);
            }
        }
        NodeEnum::JoinExpr(je) => {
            if let Some(larg) = &je.larg {
                collect_param_refs(larg, out);
            }
            if let Some(rarg) = &je.rarg {
                collect_param_refs(rarg, out);
            }
            if let Some(quals) = &je.quals {
                collect_param_refs(quals, out);
            }
        }
        // Constants, column refs, and other leaf/unrelated nodes carry no
        // parameters. Nested RangeSubselect/SelectStmt bodies are not
        // descended into here; each statement's own parameter list is
        // collected by walking that statement directly.
        _ => {}
    }
}

/// Collect every `$n` reference across a whole top-level statement's
/// target list, WHERE/HAVING clauses, FROM-clause join conditions, and
/// RETURNING list, sorted into ordinal order with duplicate ordinals
/// (the same `$n` used more than once) collapsed to one entry.
pub fn collect_statement_params(node: &Node) -> Vec<ParamRef> {
    let mut out = Vec::new();
    let Some(inner) = node.node.as_ref() else {
        return out;
    };

    match inner {
        NodeEnum::SelectStmt(select) => {
            for item in &select.target_list {
                collect_param_refs(item, &mut out);
            }
            for item in &select.from_clause {
                collect_param_refs(item, &mut out);
            }
            if let Some(where_clause) = &select.where_clause {
                collect_param_refs(where_clause, &mut out);
            }
            if let Some(having) = &select.having_clause {
                collect_param_refs(having, &mut out);
            }
            for row in &select.values_lists {
                collect_param_refs(row, &mut out);
            }
            if let Some(larg) = &select.larg {
                out.extend(collect_statement_params(larg));
            }
            if let Some(rarg) = &select.rarg {
                out.extend(collect_statement_params(rarg));
            }
        }
        NodeEnum::InsertStmt(insert) => {
            for item in &insert.returning_list {
                collect_param_refs(item, &mut out);
            }
            if let Some(select_stmt) = &insert.select_stmt {
                out.extend(collect_statement_params(select_stmt));
            }
        }
        NodeEnum::UpdateStmt(update) => {
            for item in &update.target_list {
                collect_param_refs(item, &mut out);
            }
            for item in &update.from_clause {
                collect_param_refs(item, &mut out);
            }
            if let Some(where_clause) = &update.where_clause {
                collect_param_refs(where_clause, &mut out);
            }
            for item in &update.returning_list {
                collect_param_refs(item, &mut out);
            }
        }
        NodeEnum::DeleteStmt(delete) => {
            for item in &delete.using_clause {
                collect_param_refs(item, &mut out);
            }
            if let Some(where_clause) = &delete.where_clause {
                collect_param_refs(where_clause, &mut out);
            }
            for item in &delete.returning_list {
                collect_param_refs(item, &mut out);
            }
        }
        _ => {}
    }

    out.sort();
    out.dedup();
    out
}
