use crate::{
    Aggregate, ArrayItems, AsValue, BinaryOpType, ColumnDef, ColumnRef, CompoundOperator, Cte,
    DeleteData, Expr, ExprKind, Field, Function, InsertData, InsertRows, Join, JoinType, LikeMatch,
    Meta, Order, QueryError, Result, Returning, SelectData, SequenceOp, Source, SubSelectMode,
    Table, TableRole, UnaryOpType, UpdateData, Value, collect_ctes, count_all, derived_column,
    possibly_parenthesized, references_old_values, separated_by,
    writer::{
        Context, DeleteUsingStyle, Dialect, Fragment, InsensitiveStyle, LastInsertedIdStyle,
        LimitStyle, MutationTarget, OldValuesStyle, ProcedureStyle, RecursiveFrame,
        ReturningStyle, SequenceStyle, UpdateFromStyle,
    },
};
use anyhow::Context as _;
use indexmap::IndexMap;
use std::sync::Arc;

/// Precedence of the nodes that never need parentheses.
pub const ATOMIC_PRECEDENCE: i32 = 1_000_000;

/// Operand of a string concatenation.
#[derive(Debug, Clone, Copy)]
pub enum ConcatPiece<'a> {
    Literal(&'a str),
    Expr(&'a Expr),
}

/// Dialect printer converting statements and expressions into SQL text.
///
/// Every constant is sent as a parameter: it goes through the type adapter
/// of its expression (or the default one of the [`Context`]) and is pushed to
/// `context.params` right when its placeholder is written, so the parameter
/// order is always the textual order.
pub trait SqlWriter: Send + Sync {
    fn as_dyn(&self) -> &dyn SqlWriter;

    /// Capability table of the target database.
    fn dialect(&self) -> &'static Dialect;

    /// Escape occurrences of `search` char with `replace` while copying into buffer.
    fn write_escaped(&self, out: &mut String, value: &str, search: char, replace: &str) {
        let mut position = 0;
        for (i, c) in value.char_indices() {
            if c == search {
                out.push_str(&value[position..i]);
                out.push_str(replace);
                position = i + c.len_utf8();
            }
        }
        out.push_str(&value[position..]);
    }

    /// Quote identifiers doubling the inner closing quotes.
    fn write_identifier_quoted(&self, _context: &mut Context, out: &mut String, value: &str) {
        let (open, close) = self.dialect().quote;
        let doubled: String = [close, close].iter().collect();
        out.push(open);
        self.write_escaped(out, value, close, &doubled);
        out.push(close);
    }

    /// Quoted identifier as a standalone string.
    fn identifier_quoted(&self, context: &mut Context, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        self.write_identifier_quoted(context, &mut out, value);
        out
    }

    /// Render a string literal, only used for text chosen by the engine or the schema.
    fn write_value_string(&self, out: &mut String, value: &str) {
        out.push('\'');
        self.write_escaped(out, value, '\'', "''");
        out.push('\'');
    }

    /// Render the placeholder of the last parameter pushed.
    fn write_placeholder(&self, _context: &mut Context, out: &mut String) {
        out.push('?');
    }

    /// Bind a value already in its database representation.
    fn write_bound(&self, context: &mut Context, out: &mut String, value: Value) {
        context.params.push(value);
        self.write_placeholder(context, out);
    }

    /// Convert a constant through its adapter and bind it.
    fn write_param(
        &self,
        context: &mut Context,
        out: &mut String,
        value: &Value,
        meta: &Meta,
    ) -> Result<()> {
        let adapter = meta
            .adapter
            .clone()
            .unwrap_or_else(|| context.adapter.clone());
        let value = adapter.to_db(value.clone(), &meta.data_type)?;
        self.write_bound(context, out, value);
        Ok(())
    }

    /// Render a predicate known in advance.
    fn write_constant_condition(&self, _context: &mut Context, out: &mut String, value: bool) {
        out.push_str(if value { "TRUE" } else { "FALSE" });
    }

    /// Precedence table for unary operators.
    fn expression_unary_op_precedence(&self, value: &UnaryOpType) -> i32 {
        match value {
            UnaryOpType::Negative => 1250,
            UnaryOpType::Not => 250,
        }
    }

    /// Precedence table for binary operators.
    fn expression_binary_op_precedence(&self, value: &BinaryOpType) -> i32 {
        match value {
            BinaryOpType::Or => 100,
            BinaryOpType::And => 200,
            BinaryOpType::Equal
            | BinaryOpType::NotEqual
            | BinaryOpType::Less
            | BinaryOpType::Greater
            | BinaryOpType::LessEqual
            | BinaryOpType::GreaterEqual => 300,
            BinaryOpType::Addition | BinaryOpType::Subtraction => 800,
            BinaryOpType::Multiplication | BinaryOpType::Division | BinaryOpType::Remainder => {
                900
            }
        }
    }

    /// Precedence of the string concatenation operator.
    fn expression_concat_precedence(&self) -> i32 {
        750
    }

    fn expression_precedence(&self, value: &Expr) -> i32 {
        match value.kind() {
            ExprKind::Unary { op, .. } => self.expression_unary_op_precedence(op),
            ExprKind::Binary { op, .. } => self.expression_binary_op_precedence(op),
            ExprKind::Like { .. }
            | ExprKind::InList { .. }
            | ExprKind::IsNull { .. }
            | ExprKind::InSelect { .. } => 400,
            ExprKind::Function {
                function: Function::EqualsInsensitive,
                ..
            } => 300,
            ExprKind::Function {
                function: Function::Concat,
                ..
            } => self.expression_concat_precedence(),
            ExprKind::SubSelect {
                mode: SubSelectMode::NotExists,
                ..
            } => 250,
            _ => ATOMIC_PRECEDENCE,
        }
    }

    /// Render an expression where a value is expected.
    fn write_expression(&self, context: &mut Context, out: &mut String, value: &Expr) -> Result<()> {
        self.write_expression_kind(context, out, value)
    }

    /// Render an expression where a condition is expected.
    fn write_condition(&self, context: &mut Context, out: &mut String, value: &Expr) -> Result<()> {
        self.write_expression_kind(context, out, value)
    }

    fn write_expression_kind(
        &self,
        context: &mut Context,
        out: &mut String,
        value: &Expr,
    ) -> Result<()> {
        match value.kind() {
            ExprKind::Column(column) => self.write_expression_column(context, out, column),
            ExprKind::Value(v) => self.write_param(context, out, v, value.meta()),
            ExprKind::Invalid(message) => Err(QueryError::configuration(message.clone())),
            ExprKind::Unary { op, arg } => self.write_expression_unary_op(context, out, *op, arg),
            ExprKind::Binary { op, lhs, rhs } => {
                self.write_expression_binary_op(context, out, *op, lhs, rhs)
            }
            ExprKind::Function { function, args } => {
                self.write_expression_function(context, out, function, args)
            }
            ExprKind::Like {
                lhs,
                pattern,
                matching,
                insensitive,
            } => self.write_expression_like(context, out, lhs, pattern, *matching, *insensitive),
            ExprKind::Aggregate {
                function,
                arg,
                distinct,
            } => self.write_expression_aggregate(context, out, *function, arg.as_ref(), *distinct),
            ExprKind::AggregateArray { items, .. } => {
                self.write_json_array_aggregation(context, out, items)
            }
            ExprKind::InList {
                lhs,
                values,
                negated,
            } => self.write_expression_in_list(context, out, lhs, values, *negated),
            ExprKind::IsNull { arg, negated } => {
                possibly_parenthesized!(
                    out,
                    self.expression_precedence(arg) <= 400,
                    self.write_expression(context, out, arg)?
                );
                out.push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
                Ok(())
            }
            ExprKind::SubSelect { select, mode, .. } => {
                self.write_expression_sub_select(context, out, select, *mode)
            }
            ExprKind::InSelect {
                lhs,
                select,
                negated,
            } => {
                possibly_parenthesized!(
                    out,
                    self.expression_precedence(lhs) <= 400,
                    self.write_expression(context, out, lhs)?
                );
                out.push_str(if *negated { " NOT IN (" } else { " IN (" });
                self.write_select_nested(context, out, select)?;
                out.push(')');
                Ok(())
            }
            ExprKind::Sequence { name, op } => self.write_expression_sequence(context, out, name, *op),
        }
    }

    /// Render a column reference, qualified unless the context says otherwise.
    fn write_expression_column(
        &self,
        context: &mut Context,
        out: &mut String,
        value: &ColumnRef,
    ) -> Result<()> {
        if let Source::Table(table) = &value.source
            && table.role() == TableRole::OldValues
        {
            let Some(qualifier) = context
                .target
                .as_ref()
                .filter(|v| v.table.same_table(table))
                .and_then(|v| v.old_qualifier.clone())
            else {
                return Err(QueryError::configuration(format!(
                    "The values of `{}` before the update can only be read while returning from an update of that table",
                    table.name()
                )));
            };
            out.push_str(&qualifier);
            out.push('.');
        } else if context.qualify_columns {
            self.write_column_qualifier(context, out, &value.source)?;
            out.push('.');
        }
        self.write_identifier_quoted(context, out, &value.name);
        Ok(())
    }

    /// Render the name the columns of `source` are qualified with.
    fn write_column_qualifier(
        &self,
        context: &mut Context,
        out: &mut String,
        source: &Source,
    ) -> Result<()> {
        match source {
            Source::Table(table) => {
                if let Some(qualifier) = context
                    .target
                    .as_ref()
                    .filter(|v| v.table.same_table(table))
                    .and_then(|v| v.new_qualifier.clone())
                {
                    out.push_str(&qualifier);
                } else if let Some(alias) = table.alias() {
                    self.write_identifier_quoted(context, out, alias);
                } else {
                    self.write_table_ref(context, out, table, false);
                }
            }
            Source::Cte(cte) => self.write_identifier_quoted(context, out, cte.qualifier()),
            Source::Recursive(reference) => {
                let name = recursive_name(context, reference.scope.id, true)?;
                self.write_identifier_quoted(context, out, &name);
            }
            Source::Derived(alias) => self.write_identifier_quoted(context, out, alias),
        }
        Ok(())
    }

    fn write_expression_unary_op(
        &self,
        context: &mut Context,
        out: &mut String,
        op: UnaryOpType,
        arg: &Expr,
    ) -> Result<()> {
        let parenthesized = self.expression_precedence(arg) <= self.expression_unary_op_precedence(&op);
        match op {
            UnaryOpType::Negative => {
                out.push('-');
                possibly_parenthesized!(out, parenthesized, self.write_expression(context, out, arg)?);
            }
            UnaryOpType::Not => {
                out.push_str("NOT ");
                possibly_parenthesized!(out, parenthesized, self.write_condition(context, out, arg)?);
            }
        }
        Ok(())
    }

    /// Render binary operator expression handling precedence and parentheses.
    fn write_expression_binary_op(
        &self,
        context: &mut Context,
        out: &mut String,
        op: BinaryOpType,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<()> {
        let infix = match op {
            BinaryOpType::Multiplication => " * ",
            BinaryOpType::Division => " / ",
            BinaryOpType::Remainder => " % ",
            BinaryOpType::Addition => " + ",
            BinaryOpType::Subtraction => " - ",
            BinaryOpType::Equal => " = ",
            BinaryOpType::NotEqual => " <> ",
            BinaryOpType::Less => " < ",
            BinaryOpType::Greater => " > ",
            BinaryOpType::LessEqual => " <= ",
            BinaryOpType::GreaterEqual => " >= ",
            BinaryOpType::And => " AND ",
            BinaryOpType::Or => " OR ",
        };
        let precedence = self.expression_binary_op_precedence(&op);
        let logical = op.is_logical();
        possibly_parenthesized!(
            out,
            self.expression_precedence(lhs) < precedence,
            if logical {
                self.write_condition(context, out, lhs)?
            } else {
                self.write_expression(context, out, lhs)?
            }
        );
        out.push_str(infix);
        possibly_parenthesized!(
            out,
            self.expression_precedence(rhs) <= precedence,
            if logical {
                self.write_condition(context, out, rhs)?
            } else {
                self.write_expression(context, out, rhs)?
            }
        );
        Ok(())
    }

    fn write_expression_function(
        &self,
        context: &mut Context,
        out: &mut String,
        function: &Function,
        args: &[Expr],
    ) -> Result<()> {
        match (function, args) {
            (Function::Concat, [lhs, rhs]) => self.write_concat(
                context,
                out,
                &[ConcatPiece::Expr(lhs), ConcatPiece::Expr(rhs)],
            ),
            (Function::Length, [_]) => {
                self.write_function_call(context, out, self.dialect().length_function, args)
            }
            (Function::Lower, [_]) => self.write_function_call(context, out, "lower", args),
            (Function::Upper, [_]) => self.write_function_call(context, out, "upper", args),
            (Function::Trim, [_]) => self.write_function_call(context, out, "trim", args),
            (Function::Abs, [_]) => self.write_function_call(context, out, "abs", args),
            (Function::Coalesce, [_, _]) => {
                self.write_function_call(context, out, "coalesce", args)
            }
            (Function::AsString, [arg]) => {
                out.push_str("CAST(");
                self.write_expression(context, out, arg)?;
                out.push_str(" AS ");
                out.push_str(self.dialect().text_type);
                out.push(')');
                Ok(())
            }
            (Function::EqualsInsensitive, [lhs, rhs]) => {
                out.push_str("lower(");
                self.write_expression(context, out, lhs)?;
                out.push_str(") = lower(");
                self.write_expression(context, out, rhs)?;
                out.push(')');
                Ok(())
            }
            (Function::Call(name), _) => self.write_function_call(context, out, name, args),
            _ => Err(QueryError::configuration(format!(
                "Unexpected number of arguments ({}) for {function:?}",
                args.len()
            ))),
        }
    }

    fn write_function_call(
        &self,
        context: &mut Context,
        out: &mut String,
        name: &str,
        args: &[Expr],
    ) -> Result<()> {
        out.push_str(name);
        out.push('(');
        separated_by(out, args, |out, v| self.write_expression(context, out, v), ", ")?;
        out.push(')');
        Ok(())
    }

    fn write_concat(
        &self,
        context: &mut Context,
        out: &mut String,
        pieces: &[ConcatPiece<'_>],
    ) -> Result<()> {
        separated_by(
            out,
            pieces,
            |out, v| self.write_concat_piece(context, out, v),
            " || ",
        )
    }

    fn write_concat_piece(
        &self,
        context: &mut Context,
        out: &mut String,
        piece: &ConcatPiece<'_>,
    ) -> Result<()> {
        match piece {
            ConcatPiece::Literal(v) => self.write_value_string(out, v),
            ConcatPiece::Expr(v) => possibly_parenthesized!(
                out,
                self.expression_precedence(v) < ATOMIC_PRECEDENCE,
                self.write_expression(context, out, v)?
            ),
        }
        Ok(())
    }

    /// Characters escaped with `!` in a constant like pattern.
    fn like_escaped_chars(&self) -> &'static [char] {
        &['!', '%', '_']
    }

    fn write_expression_like(
        &self,
        context: &mut Context,
        out: &mut String,
        lhs: &Expr,
        pattern: &Expr,
        matching: LikeMatch,
        insensitive: bool,
    ) -> Result<()> {
        let ilike = insensitive && self.dialect().insensitive == InsensitiveStyle::ILike;
        let lower = insensitive && !ilike;
        let (prefix, suffix) = match matching {
            LikeMatch::Contains => (true, true),
            LikeMatch::StartsWith => (false, true),
            LikeMatch::EndsWith => (true, false),
        };
        if lower {
            out.push_str("lower(");
            self.write_expression(context, out, lhs)?;
            out.push(')');
        } else {
            possibly_parenthesized!(
                out,
                self.expression_precedence(lhs) <= 400,
                self.write_expression(context, out, lhs)?
            );
        }
        out.push_str(if ilike { " ILIKE " } else { " LIKE " });
        if lower {
            out.push_str("lower(");
        }
        let escaped = match pattern.kind() {
            ExprKind::Value(value) if !value.is_null() => {
                let text = String::try_from_value(value.clone()).context(
                    QueryError::TypeAdapter("The pattern of a like predicate must be a string".into()),
                )?;
                let mut built = String::with_capacity(text.len() + 4);
                if prefix {
                    built.push('%');
                }
                for c in text.chars() {
                    if self.like_escaped_chars().contains(&c) {
                        built.push('!');
                    }
                    built.push(c);
                }
                if suffix {
                    built.push('%');
                }
                self.write_bound(context, out, Value::Varchar(Some(built)));
                true
            }
            _ => {
                let mut pieces = Vec::with_capacity(3);
                if prefix {
                    pieces.push(ConcatPiece::Literal("%"));
                }
                pieces.push(ConcatPiece::Expr(pattern));
                if suffix {
                    pieces.push(ConcatPiece::Literal("%"));
                }
                self.write_concat(context, out, &pieces)?;
                false
            }
        };
        if lower {
            out.push(')');
        }
        if escaped {
            out.push_str(" ESCAPE '!'");
        }
        Ok(())
    }

    fn write_expression_aggregate(
        &self,
        context: &mut Context,
        out: &mut String,
        function: Aggregate,
        arg: Option<&Expr>,
        distinct: bool,
    ) -> Result<()> {
        out.push_str(match function {
            Aggregate::Count | Aggregate::CountAll => "count(",
            Aggregate::Sum => "sum(",
            Aggregate::Min => "min(",
            Aggregate::Max => "max(",
            Aggregate::Average => "avg(",
        });
        if distinct {
            out.push_str("DISTINCT ");
        }
        match arg {
            Some(arg) => self.write_expression(context, out, arg)?,
            None => out.push('*'),
        }
        out.push(')');
        Ok(())
    }

    /// Render a json object built out of `fields`.
    fn write_json_object(
        &self,
        context: &mut Context,
        out: &mut String,
        fields: &[Field],
    ) -> Result<()> {
        out.push_str("json_build_object(");
        separated_by(
            out,
            fields,
            |out, v| {
                self.write_value_string(out, &v.property);
                out.push_str(", ");
                self.write_expression(context, out, &v.expr)
            },
            ", ",
        )?;
        out.push(')');
        Ok(())
    }

    /// Render one element of an aggregated json array.
    fn write_json_array_item(
        &self,
        context: &mut Context,
        out: &mut String,
        items: &ArrayItems,
    ) -> Result<()> {
        match items {
            ArrayItems::Fields(fields) => self.write_json_object(context, out, fields),
            ArrayItems::OneColumn(expr) => self.write_expression(context, out, expr),
        }
    }

    /// Render the aggregate folding the rows of a group into a json array.
    fn write_json_array_aggregation(
        &self,
        context: &mut Context,
        out: &mut String,
        items: &ArrayItems,
    ) -> Result<()> {
        out.push_str("json_agg(");
        self.write_json_array_item(context, out, items)?;
        out.push(')');
        Ok(())
    }

    fn write_expression_in_list(
        &self,
        context: &mut Context,
        out: &mut String,
        lhs: &Expr,
        values: &[Expr],
        negated: bool,
    ) -> Result<()> {
        if values.is_empty() {
            self.write_constant_condition(context, out, negated);
            return Ok(());
        }
        possibly_parenthesized!(
            out,
            self.expression_precedence(lhs) <= 400,
            self.write_expression(context, out, lhs)?
        );
        out.push_str(if negated { " NOT IN (" } else { " IN (" });
        separated_by(out, values, |out, v| self.write_expression(context, out, v), ", ")?;
        out.push(')');
        Ok(())
    }

    fn write_expression_sub_select(
        &self,
        context: &mut Context,
        out: &mut String,
        select: &SelectData,
        mode: SubSelectMode,
    ) -> Result<()> {
        match mode {
            SubSelectMode::Value => {
                out.push('(');
                self.write_select_nested(context, out, select)?;
                out.push(')');
            }
            SubSelectMode::Exists | SubSelectMode::NotExists => {
                out.push_str(if mode == SubSelectMode::Exists {
                    "EXISTS ("
                } else {
                    "NOT EXISTS ("
                });
                self.write_select_nested(context, out, select)?;
                out.push(')');
            }
            SubSelectMode::AggregatedArray => {
                let alias = context.next_alias("_agg_");
                let items = if select.one_column {
                    let Some(field) = select.fields.first() else {
                        return Err(QueryError::configuration("The inline query has no field"));
                    };
                    ArrayItems::OneColumn(derived_column(&alias, field))
                } else {
                    ArrayItems::Fields(
                        select
                            .fields
                            .iter()
                            .map(|v| Field::new(v.property.clone(), derived_column(&alias, v)))
                            .collect(),
                    )
                };
                out.push_str("(SELECT ");
                self.write_json_array_aggregation(context, out, &items)?;
                out.push_str(" FROM (");
                self.write_select_nested(context, out, select)?;
                out.push_str(") AS ");
                self.write_identifier_quoted(context, out, &alias);
                out.push(')');
            }
        }
        Ok(())
    }

    fn write_expression_sequence(
        &self,
        _context: &mut Context,
        out: &mut String,
        name: &str,
        op: SequenceOp,
    ) -> Result<()> {
        if self.dialect().sequences == SequenceStyle::Unsupported {
            return Err(QueryError::configuration(format!(
                "The {} dialect has no sequences, cannot read `{name}`",
                self.dialect().name
            )));
        }
        out.push_str(match op {
            SequenceOp::NextValue => "nextval(",
            SequenceOp::CurrentValue => "currval(",
        });
        self.write_value_string(out, name);
        out.push(')');
        Ok(())
    }

    /// Render a table, `with_alias` declares its alias.
    fn write_table_ref(
        &self,
        context: &mut Context,
        out: &mut String,
        table: &Table,
        with_alias: bool,
    ) {
        let def = table.def();
        if !def.schema.is_empty() {
            self.write_identifier_quoted(context, out, &def.schema);
            out.push('.');
        }
        self.write_identifier_quoted(context, out, &def.name);
        if with_alias && let Some(alias) = table.alias() {
            out.push_str(" AS ");
            self.write_identifier_quoted(context, out, alias);
        }
    }

    /// Render a source declaring its alias.
    fn write_source(&self, context: &mut Context, out: &mut String, source: &Source) -> Result<()> {
        match source {
            Source::Table(table) => self.write_table_ref(context, out, table, true),
            Source::Cte(cte) => {
                self.write_identifier_quoted(context, out, &cte.cte().name);
                if let Some(alias) = cte.alias() {
                    out.push_str(" AS ");
                    self.write_identifier_quoted(context, out, alias);
                }
            }
            Source::Recursive(reference) => {
                let name = recursive_name(context, reference.scope.id, true)?;
                self.write_identifier_quoted(context, out, &name);
            }
            Source::Derived(alias) => {
                return Err(QueryError::configuration(format!(
                    "The derived table `{alias}` cannot be read from directly"
                )));
            }
        }
        Ok(())
    }

    /// Render join keyword(s) for the given join type.
    fn write_join_type(&self, _context: &mut Context, out: &mut String, join_type: JoinType) {
        out.push_str(match join_type {
            JoinType::Default => "JOIN",
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL JOIN",
            JoinType::Cross => "CROSS JOIN",
        });
    }

    fn write_join(&self, context: &mut Context, out: &mut String, join: &Join) -> Result<()> {
        let mut context = context.switch_fragment(Fragment::SqlJoin);
        context.qualify_columns = true;
        self.write_join_type(&mut context, out, join.join);
        out.push(' ');
        self.write_source(&mut context, out, &join.source)?;
        if let Some(on) = &join.on {
            out.push_str(" ON ");
            self.write_condition(&mut context, out, on)?;
        }
        Ok(())
    }

    /// Render `expr AS "property"` for every field.
    fn write_projection(
        &self,
        context: &mut Context,
        out: &mut String,
        fields: &[Field],
    ) -> Result<()> {
        if fields.is_empty() {
            return Err(QueryError::configuration("Nothing to project, no field was given"));
        }
        separated_by(
            out,
            fields,
            |out, v| {
                self.write_expression(context, out, &v.expr)?;
                out.push_str(" AS ");
                self.write_identifier_quoted(context, out, &v.property);
                Ok(())
            },
            ", ",
        )
    }

    /// Render a select as a complete statement (depth 0) or as a sub-select.
    fn write_select(&self, context: &mut Context, out: &mut String, select: &SelectData) -> Result<()> {
        if context.depth == 0 {
            let ctes = collect_ctes(&select.withs())?;
            let recursive = select.recursive.as_ref().map(|_| select);
            self.write_with(context, out, &ctes, recursive)?;
        } else if select.recursive.is_some() {
            if !self.dialect().nested_with {
                return Err(QueryError::configuration(format!(
                    "The {} dialect does not accept a recursive select inside another query",
                    self.dialect().name
                )));
            }
            self.write_with(context, out, &[], Some(select))?;
        }
        self.write_select_body(context, out, select)
    }

    /// Render a select enclosed in another statement.
    fn write_select_nested(
        &self,
        context: &mut Context,
        out: &mut String,
        select: &SelectData,
    ) -> Result<()> {
        let mut context = context.switch_fragment(Fragment::SqlSelect);
        context.qualify_columns = true;
        context.depth += 1;
        self.write_select(&mut context, out, select)?;
        context.depth -= 1;
        Ok(())
    }

    /// Render the `WITH` clause: the named CTEs (dependencies first), then the recursive select.
    fn write_with(
        &self,
        context: &mut Context,
        out: &mut String,
        ctes: &[Arc<Cte>],
        recursive: Option<&SelectData>,
    ) -> Result<()> {
        if ctes.is_empty() && recursive.is_none() {
            return Ok(());
        }
        let any_recursive =
            recursive.is_some() || ctes.iter().any(|v| v.select.recursive.is_some());
        out.push_str("WITH ");
        if any_recursive && self.dialect().recursive_keyword {
            out.push_str("RECURSIVE ");
        }
        let mut first = true;
        let mut separate = |out: &mut String| {
            if !first {
                out.push_str(",\n");
            }
            first = false;
        };
        for cte in ctes {
            if cte.select.recursive.is_some() {
                separate(out);
                self.write_recursive_cte(context, out, &cte.select)?;
            }
            separate(out);
            self.write_identifier_quoted(context, out, &cte.name);
            out.push_str(" AS (");
            context.depth += 1;
            self.write_select_body(context, out, &cte.select)?;
            context.depth -= 1;
            out.push(')');
        }
        if let Some(select) = recursive {
            separate(out);
            self.write_recursive_cte(context, out, select)?;
        }
        out.push('\n');
        Ok(())
    }

    /// Render `recursive_select_N AS (base UNION ALL term)` and register its name.
    fn write_recursive_cte(
        &self,
        context: &mut Context,
        out: &mut String,
        select: &SelectData,
    ) -> Result<()> {
        let Some(recursive) = &select.recursive else {
            return Ok(());
        };
        let id = recursive.scope.id;
        let references = recursive.term.self_references(id);
        if references != 1 {
            return Err(QueryError::configuration(format!(
                "The recursive term must read from the recursive select exactly once, it does {references} times"
            )));
        }
        if recursive.term.fields.len() != select.fields.len() {
            return Err(QueryError::configuration(format!(
                "The recursive term projects {} fields, the base select {}",
                recursive.term.fields.len(),
                select.fields.len()
            )));
        }
        let name = context.next_recursive_name();
        context.recursive.push(RecursiveFrame {
            id,
            name: name.clone(),
            in_term: false,
        });
        self.write_identifier_quoted(context, out, &name);
        out.push_str(" AS (");
        context.depth += 1;
        self.write_select_core(context, out, select, false)?;
        out.push_str("\nUNION ALL\n");
        set_in_term(context, id, true);
        self.write_select_core(context, out, &recursive.term, false)?;
        set_in_term(context, id, false);
        context.depth -= 1;
        out.push(')');
        Ok(())
    }

    /// Render a select without its `WITH` clause.
    fn write_select_body(
        &self,
        context: &mut Context,
        out: &mut String,
        select: &SelectData,
    ) -> Result<()> {
        select.validate()?;
        if !select.compound.is_empty() {
            return self.write_compound_select(context, out, select);
        }
        let Some(recursive) = &select.recursive else {
            return self.write_select_core(context, out, select, true);
        };
        let name = recursive_name(context, recursive.scope.id, false)?;
        out.push_str("SELECT ");
        if select.distinct {
            out.push_str("DISTINCT ");
        }
        self.write_select_top(context, out, select);
        separated_by(
            out,
            &select.fields,
            |out, v| {
                self.write_identifier_quoted(context, out, &name);
                out.push('.');
                self.write_identifier_quoted(context, out, &v.property);
                out.push_str(" AS ");
                self.write_identifier_quoted(context, out, &v.property);
                Ok(())
            },
            ", ",
        )?;
        out.push_str("\nFROM ");
        self.write_identifier_quoted(context, out, &name);
        self.write_order_by(context, out, select)?;
        self.write_limit(context, out, select);
        Ok(())
    }

    /// Render `head OPERATOR member ...` followed by the ordering and the limits of the whole.
    fn write_compound_select(
        &self,
        context: &mut Context,
        out: &mut String,
        select: &SelectData,
    ) -> Result<()> {
        let head = SelectData {
            order_by: Vec::new(),
            limit: None,
            offset: None,
            compound: Vec::new(),
            ..select.clone()
        };
        self.write_select_core(context, out, &head, true)?;
        for compound in &select.compound {
            out.push('\n');
            self.write_compound_operator(context, out, compound.operator);
            out.push('\n');
            self.write_select_core(context, out, &compound.select, true)?;
        }
        // `TOP` would limit the first select only
        let offset = match self.dialect().limit {
            LimitStyle::TopOffsetFetch => select.offset.or(select.limit.map(|_| 0)),
            LimitStyle::LimitOffset { .. } => select.offset,
        };
        let ending = SelectData {
            order_by: select.order_by.clone(),
            limit: select.limit,
            offset,
            ..Default::default()
        };
        self.write_order_by(context, out, &ending)?;
        self.write_limit(context, out, &ending);
        Ok(())
    }

    fn write_compound_operator(
        &self,
        _context: &mut Context,
        out: &mut String,
        operator: CompoundOperator,
    ) {
        out.push_str(operator.keyword());
    }

    /// Render the select itself, `outer` adds distinct, ordering and limits.
    fn write_select_core(
        &self,
        context: &mut Context,
        out: &mut String,
        select: &SelectData,
        outer: bool,
    ) -> Result<()> {
        out.push_str("SELECT ");
        if outer {
            if select.distinct {
                out.push_str("DISTINCT ");
            }
            self.write_select_top(context, out, select);
        }
        self.write_projection(
            &mut context.switch_fragment(Fragment::SqlSelect),
            out,
            &select.fields,
        )?;
        if let Some(from) = &select.from {
            out.push_str("\nFROM ");
            self.write_source(&mut context.switch_fragment(Fragment::SqlSelectFrom), out, from)?;
        }
        for join in &select.joins {
            out.push('\n');
            self.write_join(context, out, join)?;
        }
        if let Some(condition) = &select.condition {
            out.push_str("\nWHERE ");
            self.write_condition(
                &mut context.switch_fragment(Fragment::SqlSelectWhere),
                out,
                condition,
            )?;
        }
        if !select.group_by.is_empty() {
            out.push_str("\nGROUP BY ");
            let mut context = context.switch_fragment(Fragment::SqlSelectGroupBy);
            separated_by(
                out,
                &select.group_by,
                |out, property| {
                    let Some(field) = select.field(property) else {
                        return Err(QueryError::configuration(format!(
                            "Cannot group by `{property}`, it is not a projected property"
                        )));
                    };
                    self.write_expression(&mut context, out, &field.expr)
                },
                ", ",
            )?;
        }
        if let Some(having) = &select.having {
            out.push_str("\nHAVING ");
            self.write_condition(
                &mut context.switch_fragment(Fragment::SqlSelectHaving),
                out,
                having,
            )?;
        }
        if outer {
            self.write_order_by(context, out, select)?;
            self.write_limit(context, out, select);
        }
        Ok(())
    }

    /// Render the row limit placed right after `SELECT`.
    fn write_select_top(&self, _context: &mut Context, _out: &mut String, _select: &SelectData) {}

    fn write_order_by(
        &self,
        context: &mut Context,
        out: &mut String,
        select: &SelectData,
    ) -> Result<()> {
        if select.order_by.is_empty() {
            return Ok(());
        }
        out.push_str("\nORDER BY ");
        let mut context = context.switch_fragment(Fragment::SqlSelectOrderBy);
        separated_by(
            out,
            &select.order_by,
            |out, v| {
                self.write_identifier_quoted(&mut context, out, &v.property);
                out.push_str(match v.order {
                    Order::ASC => " ASC",
                    Order::DESC => " DESC",
                });
                Ok(())
            },
            ", ",
        )
    }

    fn write_limit(&self, _context: &mut Context, out: &mut String, select: &SelectData) {
        let LimitStyle::LimitOffset { offset_only } = self.dialect().limit else {
            return;
        };
        match (select.limit, select.offset, offset_only) {
            (Some(limit), ..) => {
                out.push_str("\nLIMIT ");
                write_integer!(out, limit);
            }
            (None, Some(..), Some(max)) => {
                out.push_str("\nLIMIT ");
                out.push_str(max);
            }
            _ => {}
        }
        if let Some(offset) = select.offset {
            out.push_str("\nOFFSET ");
            write_integer!(out, offset);
        }
    }

    /// Render the statement counting the rows of `select`, ordering and limits excluded.
    fn write_count(&self, context: &mut Context, out: &mut String, select: &SelectData) -> Result<()> {
        let trimmed = SelectData {
            order_by: Vec::new(),
            limit: None,
            offset: None,
            ..select.clone()
        };
        let ctes = collect_ctes(&trimmed.withs())?;
        let recursive = trimmed.recursive.as_ref().map(|_| &trimmed);
        self.write_with(context, out, &ctes, recursive)?;
        if trimmed.distinct
            || !trimmed.group_by.is_empty()
            || trimmed.recursive.is_some()
            || !trimmed.compound.is_empty()
        {
            out.push_str("SELECT count(*) AS ");
            self.write_identifier_quoted(context, out, "result");
            out.push_str("\nFROM (");
            let mut nested = context.switch_fragment(Fragment::SqlSelect);
            nested.depth += 1;
            self.write_select_body(&mut nested, out, &trimmed)?;
            nested.depth -= 1;
            drop(nested);
            out.push_str(") AS ");
            self.write_identifier_quoted(context, out, "_count_");
            Ok(())
        } else {
            let counted = SelectData {
                fields: vec![Field::new("result", count_all())],
                one_column: true,
                ..trimmed
            };
            self.write_select_body(context, out, &counted)
        }
    }

    /// Fail when the dialect cannot send back what `returning` asks for.
    fn check_returning(
        &self,
        statement: &str,
        style: ReturningStyle,
        returning: &Returning,
    ) -> Result<()> {
        let dialect = self.dialect();
        match returning {
            Returning::None => Ok(()),
            Returning::LastInsertedId if dialect.last_inserted_id == LastInsertedIdStyle::Runner => {
                Ok(())
            }
            _ if style == ReturningStyle::Unsupported => Err(QueryError::configuration(format!(
                "The {} dialect cannot return values from {statement}",
                dialect.name
            ))),
            _ => Ok(()),
        }
    }

    /// Whether the returning clause qualifies the columns.
    fn qualify_returning(&self, _has_sources: bool) -> bool {
        true
    }

    /// Render the `RETURNING` clause closing a mutation.
    fn write_returning(
        &self,
        context: &mut Context,
        out: &mut String,
        returning: &Returning,
        table: &Table,
        has_sources: bool,
    ) -> Result<()> {
        match returning {
            Returning::None => Ok(()),
            Returning::LastInsertedId => {
                if self.dialect().last_inserted_id == LastInsertedIdStyle::Runner {
                    return Ok(());
                }
                let column = table.def().autogenerated_primary_key()?;
                out.push_str("\nRETURNING ");
                self.write_identifier_quoted(context, out, &column.name);
                Ok(())
            }
            Returning::Fields(..) | Returning::OneColumn(..) => {
                out.push_str("\nRETURNING ");
                let mut context = context.switch_fragment(Fragment::SqlReturning);
                context.qualify_columns = self.qualify_returning(has_sources);
                self.write_projection(&mut context, out, returning.fields())
            }
        }
    }

    /// Render the `OUTPUT` clause placed inside a mutation, `deleted` reads the removed rows.
    fn write_output(
        &self,
        _context: &mut Context,
        _out: &mut String,
        _returning: &Returning,
        _table: &Table,
        _deleted: bool,
    ) -> Result<()> {
        Ok(())
    }

    /// Render the table modified by an update or a delete, returns whether it
    /// must be listed again among the sources to declare its alias.
    fn write_mutation_target(&self, context: &mut Context, out: &mut String, table: &Table) -> bool {
        self.write_table_ref(context, out, table, true);
        false
    }

    fn write_default_values(&self, _context: &mut Context, out: &mut String) {
        out.push_str(if self.dialect().empty_values {
            " () VALUES ()"
        } else {
            " DEFAULT VALUES"
        });
    }

    fn write_insert(&self, context: &mut Context, out: &mut String, insert: &InsertData) -> Result<()> {
        let dialect = self.dialect();
        let table = &insert.table;
        self.check_returning("an insert", dialect.insert_returning, &insert.returning)?;
        if matches!(insert.returning, Returning::LastInsertedId) {
            table.def().autogenerated_primary_key()?;
            if dialect.last_inserted_id == LastInsertedIdStyle::Runner
                && matches!(insert.rows, InsertRows::From(..))
            {
                return Err(QueryError::configuration(format!(
                    "The {} dialect cannot return the ids inserted from a select",
                    dialect.name
                )));
            }
        }
        if references_old_values(insert.returning.fields()) {
            return Err(QueryError::configuration(
                "The values before the change can only be read while returning from an update",
            ));
        }
        context.target = Some(MutationTarget {
            table: table.clone(),
            new_qualifier: None,
            old_qualifier: None,
        });
        let ctes = collect_ctes(&insert.withs())?;
        let recursive = match &insert.rows {
            InsertRows::From(select) if select.recursive.is_some() => Some(select.as_ref()),
            _ => None,
        };
        let needs_with = !ctes.is_empty() || recursive.is_some();
        if needs_with {
            if !dialect.with_inside_insert {
                self.write_with(context, out, &ctes, recursive)?;
            } else if !matches!(insert.rows, InsertRows::From(..)) {
                return Err(QueryError::configuration(format!(
                    "The {} dialect accepts a WITH clause only in an insert from a select",
                    dialect.name
                )));
            }
        }
        out.push_str("INSERT INTO ");
        self.write_table_ref(context, out, table, false);
        let empty = IndexMap::new();
        let rows: Vec<&IndexMap<String, Expr>> = match &insert.rows {
            InsertRows::Single(row) => vec![row],
            InsertRows::Multiple(rows) => rows.iter().collect(),
            InsertRows::DefaultValues => vec![&empty],
            InsertRows::From(select) => {
                let columns = select
                    .fields
                    .iter()
                    .map(|v| writable_column(table, &v.property))
                    .collect::<Result<Vec<_>>>()?;
                self.write_insert_columns(context, out, &columns)?;
                self.write_output(context, out, &insert.returning, table, false)?;
                out.push('\n');
                if needs_with && dialect.with_inside_insert {
                    self.write_with(context, out, &ctes, recursive)?;
                }
                self.write_select_body(
                    &mut context.switch_fragment(Fragment::SqlSelect),
                    out,
                    select,
                )?;
                return self.write_returning(context, out, &insert.returning, table, false);
            }
        };
        let Some(first) = rows.first() else {
            return Err(QueryError::configuration("No row to insert"));
        };
        let mut columns = first
            .keys()
            .map(|v| writable_column(table, v))
            .collect::<Result<Vec<_>>>()?;
        let sequence = table
            .def()
            .columns
            .values()
            .find(|c| c.sequence.is_some() && !columns.iter().any(|v| v.property == c.property))
            .cloned();
        if let Some(column) = &sequence {
            columns.push(column.clone());
        }
        if columns.is_empty() {
            self.write_output(context, out, &insert.returning, table, false)?;
            self.write_default_values(context, out);
            return self.write_returning(context, out, &insert.returning, table, false);
        }
        self.write_insert_columns(context, out, &columns)?;
        self.write_output(context, out, &insert.returning, table, false)?;
        out.push_str("\nVALUES ");
        {
            let mut context = context.switch_fragment(Fragment::SqlInsertIntoValues);
            let mut separate = false;
            for row in &rows {
                if let Some(extra) = row
                    .keys()
                    .find(|k| !columns.iter().any(|c| c.property == k.as_str()))
                {
                    return Err(QueryError::configuration(format!(
                        "The property `{extra}` is missing from the first row of the insert into `{}`",
                        table.name()
                    )));
                }
                if separate {
                    out.push_str(",\n");
                }
                separate = true;
                out.push('(');
                separated_by(
                    out,
                    &columns,
                    |out, column| match (row.get(column.property.as_ref()), &column.sequence) {
                        (Some(value), ..) => {
                            let target = table.col(&column.property);
                            self.write_expression(&mut context, out, &value.adopting(target.meta()))
                        }
                        (None, Some(sequence)) => self.write_expression_sequence(
                            &mut context,
                            out,
                            sequence,
                            SequenceOp::NextValue,
                        ),
                        (None, None) if dialect.default_in_values => {
                            out.push_str("DEFAULT");
                            Ok(())
                        }
                        (None, None) => Err(QueryError::configuration(format!(
                            "The {} dialect requires every row to set `{}`",
                            dialect.name, column.property
                        ))),
                    },
                    ", ",
                )?;
                out.push(')');
            }
        }
        self.write_returning(context, out, &insert.returning, table, false)
    }

    fn write_insert_columns(
        &self,
        context: &mut Context,
        out: &mut String,
        columns: &[Arc<ColumnDef>],
    ) -> Result<()> {
        out.push_str(" (");
        separated_by(
            out,
            columns,
            |out, v| {
                self.write_identifier_quoted(context, out, &v.name);
                Ok(())
            },
            ", ",
        )?;
        out.push(')');
        Ok(())
    }

    fn write_update(&self, context: &mut Context, out: &mut String, update: &UpdateData) -> Result<()> {
        let dialect = self.dialect();
        let table = &update.table;
        if update.sets.is_empty() {
            return Err(QueryError::configuration(format!(
                "Nothing to set in the update of `{}`",
                table.name()
            )));
        }
        if update.condition.is_none() && !update.allow_no_where {
            return Err(QueryError::configuration(format!(
                "The update of `{}` has no condition, call allow_no_where to update every row",
                table.name()
            )));
        }
        self.check_returning("an update", dialect.update_returning, &update.returning)?;
        let old_values = references_old_values(update.returning.fields());
        if old_values && dialect.old_values == OldValuesStyle::Unsupported {
            return Err(QueryError::configuration(format!(
                "The {} dialect cannot return the values before an update",
                dialect.name
            )));
        }
        let snapshot = old_values && dialect.old_values == OldValuesStyle::SnapshotJoin;
        let primary_key: Vec<Arc<ColumnDef>> = table.def().primary_key().cloned().collect();
        if snapshot && primary_key.is_empty() {
            return Err(QueryError::configuration(format!(
                "Returning the values before the update requires a primary key on `{}`",
                table.name()
            )));
        }
        let ctes = collect_ctes(&update.withs())?;
        self.write_with(context, out, &ctes, None)?;
        let (new_qualifier, old_qualifier) = if snapshot {
            (
                Some(self.identifier_quoted(context, "_new_")),
                Some(self.identifier_quoted(context, "_old_")),
            )
        } else {
            (None, None)
        };
        context.target = Some(MutationTarget {
            table: table.clone(),
            new_qualifier: new_qualifier.clone(),
            old_qualifier: old_qualifier.clone(),
        });
        let multi_table =
            !update.from.is_empty() && dialect.update_from == UpdateFromStyle::MultiTable;
        out.push_str("UPDATE ");
        let mut sources: Vec<Source> = Vec::new();
        if let Some(qualifier) = &new_qualifier {
            self.write_table_ref(context, out, table, false);
            out.push_str(" AS ");
            out.push_str(qualifier);
        } else if self.write_mutation_target(context, out, table) {
            sources.push(Source::Table(table.clone()));
        }
        sources.extend(update.from.iter().cloned());
        if multi_table {
            for source in &update.from {
                out.push_str(", ");
                self.write_source(context, out, source)?;
            }
        }
        out.push_str("\nSET ");
        {
            let mut context = context.switch_fragment(Fragment::SqlUpdateSet);
            separated_by(
                out,
                &update.sets,
                |out, (property, value)| {
                    let column = writable_column(table, property)?;
                    if multi_table {
                        self.write_column_qualifier(&mut context, out, &Source::Table(table.clone()))?;
                        out.push('.');
                    }
                    self.write_identifier_quoted(&mut context, out, &column.name);
                    out.push_str(" = ");
                    let target = table.col(property);
                    self.write_expression(&mut context, out, &value.adopting(target.meta()))
                },
                ", ",
            )?;
        }
        self.write_output(context, out, &update.returning, table, false)?;
        if let Some(old_qualifier) = &old_qualifier {
            out.push_str("\nFROM (SELECT * FROM ");
            self.write_table_ref(context, out, table, false);
            out.push_str(") AS ");
            out.push_str(old_qualifier);
            for source in &sources {
                out.push_str(", ");
                self.write_source(context, out, source)?;
            }
        } else if !multi_table && !sources.is_empty() {
            out.push_str("\nFROM ");
            separated_by(out, &sources, |out, v| self.write_source(context, out, v), ", ")?;
        }
        let mut context = context.switch_fragment(Fragment::SqlUpdateWhere);
        if let (Some(new_qualifier), Some(old_qualifier)) = (&new_qualifier, &old_qualifier) {
            out.push_str("\nWHERE ");
            separated_by(
                out,
                &primary_key,
                |out, v| {
                    out.push_str(new_qualifier);
                    out.push('.');
                    self.write_identifier_quoted(&mut context, out, &v.name);
                    out.push_str(" = ");
                    out.push_str(old_qualifier);
                    out.push('.');
                    self.write_identifier_quoted(&mut context, out, &v.name);
                    Ok(())
                },
                " AND ",
            )?;
            if let Some(condition) = &update.condition {
                out.push_str(" AND ");
                possibly_parenthesized!(
                    out,
                    self.expression_precedence(condition) <= 200,
                    self.write_condition(&mut context, out, condition)?
                );
            }
        } else if let Some(condition) = &update.condition {
            out.push_str("\nWHERE ");
            self.write_condition(&mut context, out, condition)?;
        }
        let has_sources = snapshot || !update.from.is_empty();
        self.write_returning(&mut context, out, &update.returning, table, has_sources)
    }

    fn write_delete(&self, context: &mut Context, out: &mut String, delete: &DeleteData) -> Result<()> {
        let dialect = self.dialect();
        let table = &delete.table;
        if delete.condition.is_none() && !delete.allow_no_where {
            return Err(QueryError::configuration(format!(
                "The delete from `{}` has no condition, call allow_no_where to delete every row",
                table.name()
            )));
        }
        self.check_returning("a delete", dialect.delete_returning, &delete.returning)?;
        if references_old_values(delete.returning.fields()) {
            return Err(QueryError::configuration(
                "The values before the change can only be read while returning from an update",
            ));
        }
        if !delete.using.is_empty() && dialect.delete_using == DeleteUsingStyle::Unsupported {
            return Err(QueryError::configuration(format!(
                "The {} dialect cannot delete using other tables",
                dialect.name
            )));
        }
        let ctes = collect_ctes(&delete.withs())?;
        self.write_with(context, out, &ctes, None)?;
        context.target = Some(MutationTarget {
            table: table.clone(),
            new_qualifier: None,
            old_qualifier: None,
        });
        out.push_str("DELETE ");
        if !delete.using.is_empty() && dialect.delete_using == DeleteUsingStyle::MultiTable {
            self.write_column_qualifier(context, out, &Source::Table(table.clone()))?;
            out.push_str("\nFROM ");
            self.write_table_ref(context, out, table, true);
            for source in &delete.using {
                out.push_str(", ");
                self.write_source(context, out, source)?;
            }
        } else {
            out.push_str("FROM ");
            let mut sources: Vec<Source> = Vec::new();
            if self.write_mutation_target(context, out, table) {
                sources.push(Source::Table(table.clone()));
            }
            sources.extend(delete.using.iter().cloned());
            self.write_output(context, out, &delete.returning, table, true)?;
            if !sources.is_empty() {
                out.push_str(if dialect.delete_using == DeleteUsingStyle::Using {
                    "\nUSING "
                } else {
                    "\nFROM "
                });
                separated_by(out, &sources, |out, v| self.write_source(context, out, v), ", ")?;
            }
        }
        if let Some(condition) = &delete.condition {
            out.push_str("\nWHERE ");
            self.write_condition(
                &mut context.switch_fragment(Fragment::SqlDeleteFromWhere),
                out,
                condition,
            )?;
        }
        let has_sources = !delete.using.is_empty();
        self.write_returning(context, out, &delete.returning, table, has_sources)
    }

    /// Render `SELECT name(args) AS "result"`.
    fn write_function_statement(
        &self,
        context: &mut Context,
        out: &mut String,
        name: &str,
        args: &[Expr],
    ) -> Result<()> {
        let mut context = context.switch_fragment(Fragment::SqlCall);
        out.push_str("SELECT ");
        self.write_function_call(&mut context, out, name, args)?;
        out.push_str(" AS ");
        self.write_identifier_quoted(&mut context, out, "result");
        Ok(())
    }

    /// Render the call of a stored procedure.
    fn write_procedure_statement(
        &self,
        context: &mut Context,
        out: &mut String,
        name: &str,
        args: &[Expr],
    ) -> Result<()> {
        if self.dialect().procedures != ProcedureStyle::Call {
            return Err(QueryError::configuration(format!(
                "The {} dialect has no stored procedures",
                self.dialect().name
            )));
        }
        let mut context = context.switch_fragment(Fragment::SqlCall);
        out.push_str("CALL ");
        self.write_function_call(&mut context, out, name, args)
    }
}

/// Column of `table` a statement may write, computed columns are read only.
fn writable_column(table: &Table, property: &str) -> Result<Arc<ColumnDef>> {
    let Some(column) = table.def().column(property) else {
        return Err(QueryError::configuration(format!(
            "Table `{}` has no property `{property}`",
            table.name()
        )));
    };
    if column.computed {
        return Err(QueryError::configuration(format!(
            "The property `{property}` of `{}` is computed and cannot be written",
            table.name()
        )));
    }
    Ok(column.clone())
}

/// Name of a registered recursive select, `term_only` restricts it to its recursive term.
fn recursive_name(context: &Context, id: u64, term_only: bool) -> Result<String> {
    match context.recursive.iter().find(|v| v.id == id) {
        Some(frame) if frame.in_term || !term_only => Ok(frame.name.clone()),
        _ => Err(QueryError::configuration(
            "A recursive select can only be referenced inside its own recursive term",
        )),
    }
}

fn set_in_term(context: &mut Context, id: u64, in_term: bool) {
    if let Some(frame) = context.recursive.iter_mut().find(|v| v.id == id) {
        frame.in_term = in_term;
    }
}
