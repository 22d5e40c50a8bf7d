use crate::{
    ArrayItems, Expr, Field, Order, Result, Returning, SelectData, SequenceOp, Table,
    possibly_parenthesized, separated_by,
    writer::{ConcatPiece, Context, Dialect, Fragment, MutationTarget, SqlWriter},
};

/// Predicates are not values here: they are turned into bits where a value is
/// expected and compared against `1` where a condition is expected.
#[derive(Default, Debug, Clone, Copy)]
pub struct SqlServerSqlWriter {}

impl SqlServerSqlWriter {
    pub fn new() -> Self {
        Self {}
    }
}

impl SqlWriter for SqlServerSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn dialect(&self) -> &'static Dialect {
        &Dialect::SQLSERVER
    }

    fn write_placeholder(&self, context: &mut Context, out: &mut String) {
        out.push_str("@P");
        write_integer!(out, context.params.len());
    }

    fn write_constant_condition(&self, _context: &mut Context, out: &mut String, value: bool) {
        out.push_str(if value { "1 = 1" } else { "1 = 0" });
    }

    fn expression_concat_precedence(&self) -> i32 {
        800
    }

    fn write_expression(&self, context: &mut Context, out: &mut String, value: &Expr) -> Result<()> {
        if !value.is_predicate() {
            return self.write_expression_kind(context, out, value);
        }
        out.push_str("CASE WHEN ");
        self.write_expression_kind(context, out, value)?;
        out.push_str(" THEN 1 ELSE 0 END");
        Ok(())
    }

    fn write_condition(&self, context: &mut Context, out: &mut String, value: &Expr) -> Result<()> {
        if value.is_predicate() {
            return self.write_expression_kind(context, out, value);
        }
        possibly_parenthesized!(
            out,
            self.expression_precedence(value) <= 300,
            self.write_expression_kind(context, out, value)?
        );
        out.push_str(" = 1");
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
            " + ",
        )
    }

    fn like_escaped_chars(&self) -> &'static [char] {
        &['!', '%', '_', '[']
    }

    fn write_json_object(
        &self,
        context: &mut Context,
        out: &mut String,
        fields: &[Field],
    ) -> Result<()> {
        out.push_str("json_object(");
        separated_by(
            out,
            fields,
            |out, v| {
                self.write_value_string(out, &v.property);
                out.push_str(": ");
                self.write_expression(context, out, &v.expr)
            },
            ", ",
        )?;
        out.push(')');
        Ok(())
    }

    /// Plain values are wrapped into `{"result": value}`, the reader unwraps them.
    fn write_json_array_aggregation(
        &self,
        context: &mut Context,
        out: &mut String,
        items: &ArrayItems,
    ) -> Result<()> {
        out.push_str("'[' + string_agg(");
        match items {
            ArrayItems::Fields(fields) => self.write_json_object(context, out, fields)?,
            ArrayItems::OneColumn(expr) => {
                self.write_json_object(context, out, &[Field::new("result", expr)])?
            }
        }
        out.push_str(", ',') + ']'");
        Ok(())
    }

    fn write_expression_sequence(
        &self,
        context: &mut Context,
        out: &mut String,
        name: &str,
        op: SequenceOp,
    ) -> Result<()> {
        match op {
            SequenceOp::NextValue => {
                out.push_str("NEXT VALUE FOR ");
                self.write_identifier_quoted(context, out, name);
            }
            SequenceOp::CurrentValue => {
                out.push_str("(SELECT current_value FROM sys.sequences WHERE name = ");
                self.write_value_string(out, name);
                out.push(')');
            }
        }
        Ok(())
    }

    fn write_select_top(&self, _context: &mut Context, out: &mut String, select: &SelectData) {
        if let (Some(limit), None) = (select.limit, select.offset) {
            out.push_str("TOP (");
            write_integer!(out, limit);
            out.push_str(") ");
        }
    }

    fn write_order_by(
        &self,
        context: &mut Context,
        out: &mut String,
        select: &SelectData,
    ) -> Result<()> {
        if select.order_by.is_empty() {
            if select.offset.is_some() {
                out.push_str("\nORDER BY (SELECT NULL)");
            }
            return Ok(());
        }
        out.push_str("\nORDER BY ");
        let mut context = context.switch_fragment(Fragment::SqlSelectOrderBy);
        separated_by(
            out,
            &select.order_by,
            |out, v| {
                self.write_identifier_quoted(&mut context, out, &v.property);
                out.push_str(if v.order == Order::DESC { " DESC" } else { " ASC" });
                Ok(())
            },
            ", ",
        )
    }

    fn write_limit(&self, context: &mut Context, out: &mut String, select: &SelectData) {
        match (select.limit, select.offset) {
            (_, Some(offset)) => {
                out.push_str("\nOFFSET ");
                write_integer!(out, offset);
                out.push_str(" ROWS");
                if let Some(limit) = select.limit {
                    out.push_str("\nFETCH NEXT ");
                    write_integer!(out, limit);
                    out.push_str(" ROWS ONLY");
                }
            }
            (None, None) if context.depth > 0 && !select.order_by.is_empty() => {
                out.push_str("\nOFFSET 0 ROWS");
            }
            _ => {}
        }
    }

    fn write_returning(
        &self,
        _context: &mut Context,
        _out: &mut String,
        _returning: &Returning,
        _table: &Table,
        _has_sources: bool,
    ) -> Result<()> {
        Ok(())
    }

    fn write_output(
        &self,
        context: &mut Context,
        out: &mut String,
        returning: &Returning,
        table: &Table,
        deleted: bool,
    ) -> Result<()> {
        let qualifier = if deleted { "DELETED" } else { "INSERTED" };
        match returning {
            Returning::None => Ok(()),
            Returning::LastInsertedId => {
                let column = table.def().autogenerated_primary_key()?;
                out.push_str("\nOUTPUT ");
                out.push_str(qualifier);
                out.push('.');
                self.write_identifier_quoted(context, out, &column.name);
                Ok(())
            }
            Returning::Fields(..) | Returning::OneColumn(..) => {
                let previous = context.target.replace(MutationTarget {
                    table: table.clone(),
                    new_qualifier: Some(qualifier.into()),
                    old_qualifier: Some("DELETED".into()),
                });
                out.push_str("\nOUTPUT ");
                let result = {
                    let mut context = context.switch_fragment(Fragment::SqlReturning);
                    context.qualify_columns = true;
                    self.write_projection(&mut context, out, returning.fields())
                };
                context.target = previous;
                result
            }
        }
    }

    fn write_mutation_target(&self, context: &mut Context, out: &mut String, table: &Table) -> bool {
        match table.alias() {
            Some(alias) => {
                self.write_identifier_quoted(context, out, alias);
                true
            }
            None => {
                self.write_table_ref(context, out, table, false);
                false
            }
        }
    }

    fn write_procedure_statement(
        &self,
        context: &mut Context,
        out: &mut String,
        name: &str,
        args: &[Expr],
    ) -> Result<()> {
        let mut context = context.switch_fragment(Fragment::SqlCall);
        out.push_str("EXEC ");
        out.push_str(name);
        if !args.is_empty() {
            out.push(' ');
            separated_by(
                out,
                args,
                |out, v| self.write_expression(&mut context, out, v),
                ", ",
            )?;
        }
        Ok(())
    }
}
