mod resource {
    pub mod runner;
    pub mod schema;
}

#[cfg(test)]
mod tests {
    use crate::resource::{
        runner::{Call, MockRunner, Response, init_logs, rows},
        schema::{company, employee},
    };
    use indoc::indoc;
    use sluice::{
        DataType, ErrorKind, MySqlSqlWriter, PostgresSqlWriter, QueryError, QueryRunner, Record,
        Session, SqlServerSqlWriter, SqliteSqlWriter, Value, delete_from, fields, insert_into,
        record, select_from, update,
    };

    fn kind(error: &sluice::Error) -> Option<ErrorKind> {
        QueryError::kind_of(error)
    }

    #[tokio::test]
    async fn select_rows_become_records() {
        init_logs();
        let company = company();
        let mut session = Session::new(MockRunner::new(PostgresSqlWriter::new()));
        session.runner().respond(rows(
            &["id", "name", "parentId"],
            vec![
                vec![
                    Value::Int32(Some(1)),
                    Value::Varchar(Some("ACME".into())),
                    Value::Int32(None),
                ],
                vec![
                    Value::Int64(Some(2)),
                    Value::Varchar(Some("Globex".into())),
                    Value::Int64(Some(1)),
                ],
            ],
        ));
        let query = select_from(&company)
            .select(fields! {
                "id" => company.col("id"),
                "name" => company.col("name"),
                "parentId" => company.col("parentId"),
            })
            .filter(company.col("name").not_equals("Initech"));
        let records = query.execute_many(&mut session).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("id"), Some(&Value::Int32(Some(1))));
        assert!(!records[0].contains("parentId"));
        assert_eq!(records[1].get("id"), Some(&Value::Int32(Some(2))));
        assert_eq!(records[1].get("parentId"), Some(&Value::Int32(Some(1))));
        assert_eq!(records[1].get_as::<String>("name").unwrap(), "Globex");

        let executed = session.runner().executed();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].call, Call::Query);
        assert_eq!(
            executed[0].sql,
            indoc! {r#"
                SELECT "company"."id" AS "id", "company"."name" AS "name", "company"."parent_id" AS "parentId"
                FROM "company"
                WHERE "company"."name" <> $1
            "#}
            .trim()
        );
        assert_eq!(executed[0].params, [Value::Varchar(Some("Initech".into()))]);
    }

    #[tokio::test]
    async fn null_for_a_mandatory_property() {
        let company = company();
        let mut session = Session::new(MockRunner::new(PostgresSqlWriter::new()));
        session.runner().respond(rows(
            &["id", "name"],
            vec![vec![Value::Int32(Some(1)), Value::Null]],
        ));
        let query = select_from(&company)
            .select(fields! { "id" => company.col("id"), "name" => company.col("name") });
        let error = query.execute_many(&mut session).await.unwrap_err();
        assert_eq!(kind(&error), Some(ErrorKind::TypeAdapter));
    }

    #[tokio::test]
    async fn left_joined_columns_may_be_missing() {
        let company = company();
        let employee = employee();
        let mut session = Session::new(MockRunner::new(PostgresSqlWriter::new()));
        session.runner().respond(rows(
            &["name", "company"],
            vec![vec![Value::Varchar(Some("Ann".into())), Value::Varchar(None)]],
        ));
        let joined = company.for_use_in_left_join();
        let query = select_from(&employee)
            .left_join(&joined, employee.col("companyId").equals(joined.col("id")))
            .select(fields! { "name" => employee.col("name"), "company" => joined.col("name") });
        let records = query.execute_many(&mut session).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].contains("company"));
        assert_eq!(records[0].require::<String>("name").unwrap(), "Ann");
    }

    #[tokio::test]
    async fn single_row_selects() {
        let company = company();
        let mut session = Session::new(MockRunner::new(PostgresSqlWriter::new()));
        let query = select_from(&company)
            .select(fields! { "name" => company.col("name") })
            .filter(company.col("id").equals(4));
        let row = || vec![Value::Varchar(Some("ACME".into()))];

        session.runner().respond(rows(&["name"], vec![]));
        let error = query.execute_one(&mut session).await.unwrap_err();
        assert_eq!(kind(&error), Some(ErrorKind::EmptyResult));

        session.runner().respond(rows(&["name"], vec![row(), row()]));
        let error = query.execute_one(&mut session).await.unwrap_err();
        assert_eq!(kind(&error), Some(ErrorKind::ResultCountViolation));

        session.runner().respond(rows(&["name"], vec![]));
        assert_eq!(query.execute_none_or_one(&mut session).await.unwrap(), None);

        session.runner().respond(rows(&["name"], vec![row(), row()]));
        let error = query.execute_none_or_one(&mut session).await.unwrap_err();
        assert_eq!(kind(&error), Some(ErrorKind::ResultCountViolation));

        session.runner().respond(rows(&["name"], vec![row()]));
        let record = query.execute_one(&mut session).await.unwrap();
        assert_eq!(record, record! { "name" => "ACME" });
    }

    #[tokio::test]
    async fn one_column_values() {
        let company = company();
        let mut session = Session::new(MockRunner::new(PostgresSqlWriter::new()));
        session.runner().respond(rows(
            &["result"],
            vec![vec![Value::Int64(Some(3))], vec![Value::Int64(Some(5))]],
        ));
        let ids = select_from(&company).select_one_column(company.col("id"));
        assert_eq!(
            ids.execute_many(&mut session).await.unwrap(),
            [Value::Int32(Some(3)), Value::Int32(Some(5))]
        );
    }

    #[tokio::test]
    async fn page_counts_every_row() {
        let company = company();
        let mut session = Session::new(MockRunner::new(PostgresSqlWriter::new()));
        session
            .runner()
            .respond(rows(&["result"], vec![vec![Value::Int64(Some(12))]]))
            .respond(rows(
                &["name"],
                vec![
                    vec![Value::Varchar(Some("ACME".into()))],
                    vec![Value::Varchar(Some("Globex".into()))],
                ],
            ));
        let query = select_from(&company)
            .select(fields! { "name" => company.col("name") })
            .filter(company.col("parentId").is_null())
            .order_by("name")
            .limit(2)
            .offset(4);
        let page = query.execute_page(&mut session).await.unwrap();
        assert_eq!(page.count, 12);
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[1].get_as::<String>("name").unwrap(), "Globex");

        let executed = session.runner().executed();
        assert_eq!(
            executed[0].sql,
            "SELECT count(*) AS \"result\"\nFROM \"company\"\nWHERE \"company\".\"parent_id\" IS NULL"
        );
        assert!(executed[1].sql.ends_with("ORDER BY \"name\" ASC\nLIMIT 2\nOFFSET 4"));
    }

    #[tokio::test]
    async fn inserted_ids() {
        let company = company();
        let mut session = Session::new(MockRunner::new(PostgresSqlWriter::new()));
        session
            .runner()
            .respond(Response::Id(Value::Int64(Some(7))))
            .respond(Response::Ids(vec![
                Value::Int64(Some(8)),
                Value::Int64(Some(9)),
            ]));

        let single = insert_into(&company)
            .set("name", "ACME")
            .returning_last_inserted_id();
        assert_eq!(
            single.execute(&mut session).await.unwrap(),
            Value::Int32(Some(7))
        );

        let batch = insert_into(&company)
            .values_many([record! { "name" => "Globex" }, record! { "name" => "Initech" }])
            .returning_last_inserted_id();
        assert_eq!(
            batch.execute_many(&mut session).await.unwrap(),
            [Value::Int32(Some(8)), Value::Int32(Some(9))]
        );
        let error = batch.execute(&mut session).await.unwrap_err();
        assert_eq!(kind(&error), Some(ErrorKind::Configuration));

        let executed = session.runner().executed();
        assert_eq!(executed.len(), 2);
        assert_eq!(executed[0].call, Call::InsertId);
        assert_eq!(
            executed[0].sql,
            "INSERT INTO \"company\" (\"name\")\nVALUES ($1)\nRETURNING \"id\""
        );
        assert_eq!(executed[1].call, Call::InsertIds);
    }

    #[tokio::test]
    async fn combined_selects_read_as_one() {
        let company = company();
        let employee = employee();
        let mut session = Session::new(MockRunner::new(PostgresSqlWriter::new()));
        session.runner().respond(rows(
            &["name"],
            vec![
                vec![Value::Varchar(Some("ACME".into()))],
                vec![Value::Varchar(Some("Ann".into()))],
            ],
        ));
        let query = select_from(&company)
            .select(fields! { "name" => company.col("name") })
            .filter(company.col("id").equals(1))
            .union_all(
                select_from(&employee)
                    .select(fields! { "name" => employee.col("name") })
                    .filter(employee.col("companyId").equals(1)),
            );
        let records = query.execute_many(&mut session).await.unwrap();
        assert_eq!(records, [record! { "name" => "ACME" }, record! { "name" => "Ann" }]);
        let executed = session.runner().executed();
        assert!(executed[0].sql.contains("= $1\nUNION ALL\nSELECT"));
        assert!(executed[0].sql.ends_with("= $2"));
        assert_eq!(executed[0].params, [Value::Int32(Some(1)), Value::Int32(Some(1))]);
    }

    #[tokio::test]
    async fn batch_ids_derived_from_the_first() {
        let company = company();
        let mut session = Session::new(MockRunner::new(MySqlSqlWriter::new()));
        session
            .runner()
            .respond(Response::Id(Value::Int64(Some(41))));
        let batch = insert_into(&company)
            .values_many([
                record! { "name" => "ACME" },
                record! { "name" => "Globex" },
                record! { "name" => "Initech" },
            ])
            .returning_last_inserted_id();
        assert_eq!(
            batch.execute_many(&mut session).await.unwrap(),
            [
                Value::Int32(Some(41)),
                Value::Int32(Some(42)),
                Value::Int32(Some(43)),
            ]
        );
        let executed = session.runner().executed();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].call, Call::InsertId);
        assert_eq!(
            executed[0].sql,
            "INSERT INTO `company` (`name`)\nVALUES (?),\n(?),\n(?)"
        );
    }

    #[tokio::test]
    async fn batch_ids_past_the_range_of_the_key() {
        let company = company();
        let mut session = Session::new(MockRunner::new(MySqlSqlWriter::new()));
        session
            .runner()
            .respond(Response::Id(Value::Int32(Some(i32::MAX))))
            .respond(Response::Id(Value::Int64(Some(i64::MAX))));
        let batch = insert_into(&company)
            .values_many([record! { "name" => "ACME" }, record! { "name" => "Globex" }])
            .returning_last_inserted_id();
        let error = batch.execute_many(&mut session).await.unwrap_err();
        assert_eq!(kind(&error), Some(ErrorKind::TypeAdapter));
        assert!(format!("{error:#}").contains("out of range"));
        let error = batch.execute_many(&mut session).await.unwrap_err();
        assert_eq!(kind(&error), Some(ErrorKind::TypeAdapter));
    }

    #[tokio::test]
    async fn empty_batch_runs_nothing() {
        let company = company();
        let mut session = Session::new(MockRunner::new(PostgresSqlWriter::new()));
        let insert = insert_into(&company).values_many(Vec::<Record>::new());
        assert_eq!(insert.execute(&mut session).await.unwrap(), 0);
        let ids = insert.clone().returning_last_inserted_id();
        assert!(ids.execute_many(&mut session).await.unwrap().is_empty());
        assert!(session.runner().executed().is_empty());
    }

    #[tokio::test]
    async fn mutations_report_affected_rows() {
        let company = company();
        let mut session = Session::new(MockRunner::new(PostgresSqlWriter::new()));
        session
            .runner()
            .respond(Response::Affected(1))
            .respond(Response::Affected(3))
            .respond(Response::Affected(2));

        let insert = insert_into(&company).set("name", "ACME");
        assert_eq!(insert.execute(&mut session).await.unwrap(), 1);

        let rename = update(&company)
            .set("name", "Globex")
            .filter(company.col("parentId").equals(1))
            .expect_rows(1..=1);
        let error = rename.execute(&mut session).await.unwrap_err();
        assert_eq!(kind(&error), Some(ErrorKind::ResultCountViolation));

        let remove = delete_from(&company).filter(company.col("parentId").is_not_null());
        assert_eq!(remove.execute(&mut session).await.unwrap(), 2);

        let calls: Vec<Call> = session.runner().executed().iter().map(|v| v.call).collect();
        assert_eq!(calls, [Call::Mutation, Call::Mutation, Call::Mutation]);
    }

    #[tokio::test]
    async fn mutations_returning_rows() {
        let company = company();
        let mut session = Session::new(MockRunner::new(PostgresSqlWriter::new()));
        session
            .runner()
            .respond(rows(&["result"], vec![vec![Value::Int32(Some(5))]]))
            .respond(rows(
                &["id", "name"],
                vec![vec![
                    Value::Int32(Some(5)),
                    Value::Varchar(Some("Globex".into())),
                ]],
            ));

        let insert = insert_into(&company)
            .set("name", "ACME")
            .returning_one_column(company.col("id"));
        assert_eq!(
            insert.execute_one(&mut session).await.unwrap(),
            Value::Int32(Some(5))
        );

        let rename = update(&company)
            .set("name", "Globex")
            .filter(company.col("id").equals(5))
            .returning(fields! { "id" => company.col("id"), "name" => company.col("name") });
        let record = rename.execute_one(&mut session).await.unwrap();
        assert_eq!(record, record! { "id" => 5, "name" => "Globex" });
    }

    #[tokio::test]
    async fn configuration_errors_dispatch_nothing() {
        let company = company();
        let mut session = Session::new(MockRunner::new(PostgresSqlWriter::new()));
        let unbounded = update(&company).set("name", "Globex");
        let error = unbounded.execute(&mut session).await.unwrap_err();
        assert_eq!(kind(&error), Some(ErrorKind::Configuration));

        let unknown = select_from(&company).select(fields! { "x" => company.col("missing") });
        let error = unknown.execute_many(&mut session).await.unwrap_err();
        assert_eq!(kind(&error), Some(ErrorKind::Configuration));
        assert!(session.runner().executed().is_empty());
    }

    #[tokio::test]
    async fn runner_failure_carries_the_statement() {
        let company = company();
        let mut session = Session::new(MockRunner::new(PostgresSqlWriter::new()));
        session
            .runner()
            .respond(Response::Fail("relation \"company\" does not exist".into()));
        let query = select_from(&company).select(fields! { "name" => company.col("name") });
        let error = query.execute_many(&mut session).await.unwrap_err();
        assert_eq!(kind(&error), Some(ErrorKind::Execution));
        let Some(QueryError::Execution { location, sql }) = error.downcast_ref::<QueryError>()
        else {
            panic!("An execution error was expected, found {error:#}");
        };
        assert!(location.contains("execution.rs"), "{location}");
        assert!(sql.starts_with("SELECT \"company\".\"name\""), "{sql}");
        assert!(format!("{error:#}").contains("does not exist"));
    }

    #[tokio::test]
    async fn functions_and_procedures() {
        let mut session = Session::new(MockRunner::new(PostgresSqlWriter::new()));
        session
            .runner()
            .respond(rows(&["result"], vec![vec![Value::Int32(Some(42))]]))
            .respond(rows(&["result"], vec![vec![Value::Null]]))
            .respond(Response::Affected(0));

        let value = session
            .execute_function("next_invoice_number", [2024], DataType::BigInt)
            .await
            .unwrap();
        assert_eq!(value, Value::Int64(Some(42)));
        let value = session
            .execute_function("last_login", ["ann"], DataType::LocalDateTime)
            .await
            .unwrap();
        assert_eq!(value, Value::Null);
        session
            .execute_procedure("archive_company", [7])
            .await
            .unwrap();

        let executed = session.runner().executed();
        assert_eq!(executed[0].sql, "SELECT next_invoice_number($1) AS \"result\"");
        assert_eq!(executed[0].params, [Value::Int32(Some(2024))]);
        assert_eq!(executed[2].call, Call::Mutation);
        assert_eq!(executed[2].sql, "CALL archive_company($1)");

        let mut session = Session::new(MockRunner::new(SqliteSqlWriter::new()));
        let error = session
            .execute_procedure("archive_company", [7])
            .await
            .unwrap_err();
        assert_eq!(kind(&error), Some(ErrorKind::Configuration));
        assert!(session.runner().executed().is_empty());
    }

    #[test]
    fn placeholders_follow_the_parameters() {
        let mut params = vec![Value::Int32(Some(1))];
        let runner = MockRunner::new(PostgresSqlWriter::new());
        assert_eq!(runner.add_param(&mut params, Value::Int32(Some(2))), "$2");
        let runner = MockRunner::new(SqlServerSqlWriter::new());
        assert_eq!(runner.add_param(&mut params, "x".into()), "@P3");
        let runner = MockRunner::new(MySqlSqlWriter::new());
        assert_eq!(runner.add_param(&mut params, Value::Null), "?");
        assert_eq!(
            params,
            [
                Value::Int32(Some(1)),
                Value::Int32(Some(2)),
                Value::Varchar(Some("x".into())),
                Value::Null,
            ]
        );
    }
}
