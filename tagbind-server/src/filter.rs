use tagbind_api::{TagFilter, Uuid};

pub enum Bind {
    Bool(bool),
    Uuid(Uuid),
    String(String),
}

#[derive(Default)]
pub struct Sql {
    pub where_clause: String,
    pub binds: Vec<Bind>,
}

impl Sql {
    /// Adds a Bind, returning the index that should be used to refer to it
    /// assuming the first bind is at index first_bind_idx
    fn add_bind(&mut self, first_bind_idx: usize, b: Bind) -> usize {
        let res = first_bind_idx + self.binds.len();
        self.binds.push(b);
        res
    }

    pub fn bind_all<'q>(
        &self,
        mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
        for b in &self.binds {
            query = match b {
                Bind::Bool(v) => query.bind(*v),
                Bind::Uuid(v) => query.bind(*v),
                Bind::String(v) => query.bind(v.clone()),
            };
        }
        query
    }
}

/// Turns the conjunctive admin list filters into a WHERE clause with
/// numbered binds starting at first_bind_idx.
pub fn to_postgres(f: &TagFilter, first_bind_idx: usize) -> Sql {
    let mut res = Sql::default();
    res.where_clause.push_str("(true");
    if let Some(status) = f.status {
        let idx = res.add_bind(first_bind_idx, Bind::String(String::from(status.as_str())));
        res.where_clause.push_str(&format!(" AND status = ${idx}"));
    }
    if let Some(owner) = f.owner_id {
        let idx = res.add_bind(first_bind_idx, Bind::Uuid(owner.0));
        res.where_clause.push_str(&format!(" AND owner_id = ${idx}"));
    }
    if let Some(injected) = f.is_injected {
        let idx = res.add_bind(first_bind_idx, Bind::Bool(injected));
        res.where_clause.push_str(&format!(" AND is_injected = ${idx}"));
    }
    res.where_clause.push(')');
    res
}
