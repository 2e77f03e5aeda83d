use std::sync::Mutex;

use sql_mapper_core::runtime::{ExecutionContext, Params, Row, RowShapeError, Value};
use sql_mapper_demo::queries;

#[derive(Debug, PartialEq)]
enum MemoryError {
    UnknownStatement(String),
    RowShape(RowShapeError),
}

impl From<RowShapeError> for MemoryError {
    fn from(value: RowShapeError) -> Self {
        MemoryError::RowShape(value)
    }
}

#[derive(Debug, Clone)]
struct User {
    user_id: String,
    name: String,
    age: i64,
}

impl User {
    fn new(user_id: &str, name: &str, age: i64) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            age,
        }
    }
}

/// Understands exactly the statements in `queries/`.
struct MemoryDb {
    users: Mutex<Vec<User>>,
    extra_column: bool,
}

impl MemoryDb {
    fn new(users: Vec<User>) -> Self {
        Self {
            users: Mutex::new(users),
            extra_column: false,
        }
    }
}

fn text(params: &Params, name: &str) -> String {
    params
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn int(params: &Params, name: &str) -> i64 {
    params.get(name).and_then(Value::as_i64).unwrap_or_default()
}

impl ExecutionContext for MemoryDb {
    type Error = MemoryError;

    async fn execute(&self, query: &str, params: &Params) -> Result<Vec<Row>, MemoryError> {
        let mut users = self.users.lock().unwrap();
        let mut rows: Vec<Vec<Value>> = match query {
            queries::SIMPLE_QUERY => users
                .iter()
                .filter(|user| user.user_id == text(params, "user_id"))
                .map(|user| vec![user.name.clone().into()])
                .collect(),
            queries::CREATE_USER => {
                let user = User::new(
                    &text(params, "user_id"),
                    &text(params, "name"),
                    int(params, "age"),
                );
                let row = vec![user.user_id.clone().into()];
                users.push(user);
                vec![row]
            }
            queries::USERS_BY_AGE => {
                let (min, max) = (int(params, "min_age"), int(params, "max_age"));
                let mut matching: Vec<_> = users
                    .iter()
                    .filter(|user| (min..=max).contains(&user.age))
                    .collect();
                matching.sort_by(|left, right| left.user_id.cmp(&right.user_id));
                matching
                    .into_iter()
                    .map(|user| {
                        vec![
                            user.user_id.clone().into(),
                            user.name.clone().into(),
                            user.age.into(),
                        ]
                    })
                    .collect()
            }
            _ => return Err(MemoryError::UnknownStatement(query.to_string())),
        };
        if self.extra_column {
            rows.iter_mut().for_each(|row| row.push(Value::Null));
        }
        Ok(rows.into_iter().map(Row::new).collect())
    }
}

#[test]
fn generated_constants_hold_single_line_sql() {
    assert_eq!(
        queries::SIMPLE_QUERY,
        "SELECT name FROM user WHERE user_id = :user_id"
    );
    assert!(!queries::USERS_BY_AGE.contains('\n'));
    assert!(!queries::USERS_BY_AGE.contains("inclusive"));
    assert!(queries::CREATE_USER.ends_with("RETURNING user_id"));
}

#[tokio::test]
async fn simple_query_returns_matching_row() {
    let db = MemoryDb::new(vec![User::new("sam", "sam", 30), User::new("kim", "kim", 25)]);

    let result = queries::simple_query(&db, "sam").await.unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].name, Value::from("sam"));
}

#[tokio::test]
async fn no_match_is_an_empty_result() {
    let db = MemoryDb::new(vec![User::new("sam", "sam", 30)]);
    let result = queries::simple_query(&db, "nobody").await.unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn arguments_follow_sorted_names() {
    let db = MemoryDb::new(vec![]);

    // age, name, user_id
    let created = queries::create_user(&db, 41, "Ann", "ann").await.unwrap();
    assert_eq!(
        created,
        [queries::CreateUserRow {
            user_id: Value::from("ann")
        }]
    );

    queries::create_user(&db, 19, "Bo", "bo").await.unwrap();
    // max_age, min_age
    let adults = queries::users_by_age(&db, 99, 21).await.unwrap();
    assert_eq!(adults.len(), 1);
    assert_eq!(adults[0].user_id, Value::from("ann"));
    assert_eq!(adults[0].name, Value::from("Ann"));
    assert_eq!(adults[0].years, Value::Int(41));
}

#[tokio::test]
async fn row_shape_mismatch_is_reported() {
    let mut db = MemoryDb::new(vec![User::new("sam", "sam", 30)]);
    db.extra_column = true;

    let error = queries::simple_query(&db, "sam").await.unwrap_err();

    assert_eq!(
        error,
        MemoryError::RowShape(RowShapeError {
            expected: 1,
            found: 2
        })
    );
}
