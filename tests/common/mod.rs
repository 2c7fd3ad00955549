//! Shared test doubles for the gateway's external collaborators: a small
//! glob-matching policy engine and a selection-walking execution engine that
//! honors GraphQL null propagation.

// Each integration test binary compiles this module and uses its own subset.
#![allow(dead_code)]

use apollo_compiler::ast;
use apollo_compiler::executable::{Field, Selection, SelectionSet};
use apollo_compiler::ExecutableDocument;
use fieldgate::{
    ast_to_value, resolver, AccessRequest, AuthenticateFn, ClientRequest, ConditionOperator,
    Error, FieldRequest, Gateway, InMemoryCache, Object, OperationKind, Policy, PolicyEffect,
    PolicyEngine, Principal, RequestContext, Response, SchemaSource, Value,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json_bytes::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::BoxError;

// [ policy engine ]-------------------------------------------------------

/// A deny-by-default policy engine with glob resource patterns: `User::*`
/// matches every field of `User`, `*` matches anything. An explicit Deny
/// beats any Allow.
pub struct GlobPolicyEngine {
    policies: Vec<Policy>,
}

impl GlobPolicyEngine {
    pub fn new(policies: Vec<Policy>) -> Self {
        Self { policies }
    }
}

fn pattern_matches(pattern: &str, resource: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => resource.starts_with(prefix),
        None => pattern == resource,
    }
}

impl PolicyEngine for GlobPolicyEngine {
    fn evaluate_access(&self, request: &AccessRequest<'_>) -> Result<bool, BoxError> {
        if self.policies.is_empty() {
            return Err("policy engine constructed with zero policies".into());
        }
        let roles = &request.context.principal().roles;
        let matching = self.policies.iter().filter(|policy| {
            policy
                .resources
                .iter()
                .any(|pattern| pattern_matches(pattern, request.resource))
                && policy
                    .actions
                    .iter()
                    .any(|action| action == "*" || action == request.action.as_str())
                && policy
                    .roles
                    .iter()
                    .any(|role| role == "*" || roles.contains(role))
                && policy.conditions.iter().all(|condition| {
                    let actual = request.context.lookup(&condition.field);
                    let expected: Vec<Option<Value>> = condition
                        .expected_on_context
                        .iter()
                        .map(|path| request.context.lookup(path))
                        .collect();
                    let any_equal = actual.is_some() && expected.contains(&actual);
                    match condition.operator {
                        ConditionOperator::Match => any_equal,
                        ConditionOperator::NotMatch => !any_equal,
                    }
                })
        });

        let mut allowed = false;
        for policy in matching {
            match policy.effect {
                PolicyEffect::Deny => return Ok(false),
                PolicyEffect::Allow => allowed = true,
            }
        }
        Ok(allowed)
    }
}

pub fn policy(
    id: &str,
    resources: &[&str],
    actions: &[&str],
    effect: PolicyEffect,
    roles: &[&str],
) -> Policy {
    Policy {
        id: id.to_string(),
        resources: resources.iter().map(|s| s.to_string()).collect(),
        actions: actions.iter().map(|s| s.to_string()).collect(),
        effect,
        roles: roles.iter().map(|s| s.to_string()).collect(),
        conditions: Vec::new(),
    }
}

// [ execution engine ]----------------------------------------------------

/// Executes `query` against the gateway the way the real engine would: walks
/// the selection tree, resolves every field through the interception stack,
/// converts a field error into `null` data plus an `errors` entry, and
/// propagates a failed non-nullable field to the nearest nullable ancestor
/// without aborting sibling fields.
pub async fn execute(gateway: &Gateway, context: &RequestContext, query: &str) -> Response {
    let document =
        match ExecutableDocument::parse_and_validate(gateway.schema(), query, "query.graphql") {
            Ok(document) => document,
            Err(errors) => {
                return Response::builder()
                    .errors(vec![Error {
                        message: errors.to_string(),
                        ..Default::default()
                    }])
                    .build()
            }
        };
    let operation = document
        .operations
        .get(None)
        .expect("test queries carry exactly one operation");
    let kind = OperationKind::from(operation.operation_type);
    let root_type = gateway
        .root_operation(kind)
        .expect("composed schema has a root for the operation")
        .to_string();

    let mut errors = Vec::new();
    let data = match resolve_selection_set(
        gateway,
        context,
        kind,
        &root_type,
        &Value::Null,
        &operation.selection_set,
        Vec::new(),
        &mut errors,
    )
    .await
    {
        Ok(object) => Value::Object(object),
        Err(Propagate) => Value::Null,
    };

    Response::builder().data(data).errors(errors).build()
}

/// A failed non-nullable position: the parent has to become null.
struct Propagate;

#[allow(clippy::too_many_arguments)]
fn resolve_selection_set<'a>(
    gateway: &'a Gateway,
    context: &'a RequestContext,
    kind: OperationKind,
    parent_type: &'a str,
    parent: &'a Value,
    selection_set: &'a SelectionSet,
    path: Vec<Value>,
    errors: &'a mut Vec<Error>,
) -> BoxFuture<'a, Result<Object, Propagate>> {
    async move {
        let mut object = Object::new();
        for selection in &selection_set.selections {
            let Selection::Field(field) = selection else {
                // fragments are not part of the harness
                continue;
            };
            let key = field.response_key().as_str();
            if field.name == "__typename" {
                object.insert(key.to_string(), json!(parent_type));
                continue;
            }

            let mut field_path = path.clone();
            field_path.push(json!(key));

            let mut args = Object::new();
            for argument in &field.arguments {
                args.insert(argument.name.as_str().to_string(), ast_to_value(&argument.value));
            }
            let request = FieldRequest::builder()
                .parent(parent.clone())
                .args(args)
                .context(context.clone())
                .metadata(gateway.field_metadata(parent_type, &field.name, kind))
                .build();

            match gateway.resolve_field(request).await {
                Ok(value) => {
                    match complete_value(
                        gateway,
                        context,
                        kind,
                        field.ty(),
                        value,
                        field,
                        field_path,
                        errors,
                    )
                    .await
                    {
                        Ok(completed) => {
                            object.insert(key.to_string(), completed);
                        }
                        Err(Propagate) => return Err(Propagate),
                    }
                }
                Err(field_error) => {
                    errors.push(
                        field_error.to_graphql_error(Some(Value::Array(field_path))),
                    );
                    if field.ty().is_non_null() {
                        return Err(Propagate);
                    }
                    object.insert(key.to_string(), Value::Null);
                }
            }
        }
        Ok(object)
    }
    .boxed()
}

#[allow(clippy::too_many_arguments)]
fn complete_value<'a>(
    gateway: &'a Gateway,
    context: &'a RequestContext,
    kind: OperationKind,
    ty: &'a ast::Type,
    value: Value,
    field: &'a Field,
    path: Vec<Value>,
    errors: &'a mut Vec<Error>,
) -> BoxFuture<'a, Result<Value, Propagate>> {
    async move {
        if value.is_null() {
            return if ty.is_non_null() {
                Err(Propagate)
            } else {
                Ok(Value::Null)
            };
        }
        match ty {
            ast::Type::List(inner) | ast::Type::NonNullList(inner) => {
                let Value::Array(items) = value else {
                    return Err(Propagate);
                };
                let mut completed = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    let mut item_path = path.clone();
                    item_path.push(json!(index));
                    match complete_value(
                        gateway, context, kind, inner, item, field, item_path, errors,
                    )
                    .await
                    {
                        Ok(item) => completed.push(item),
                        // a failed non-null item nulls the whole list
                        Err(Propagate) => {
                            return if ty.is_non_null() {
                                Err(Propagate)
                            } else {
                                Ok(Value::Null)
                            };
                        }
                    }
                }
                Ok(Value::Array(completed))
            }
            ast::Type::Named(_) | ast::Type::NonNullNamed(_) => {
                if field.selection_set.selections.is_empty() {
                    return Ok(value);
                }
                let type_name = ty.inner_named_type().as_str().to_string();
                match resolve_selection_set(
                    gateway,
                    context,
                    kind,
                    &type_name,
                    &value,
                    &field.selection_set,
                    path,
                    errors,
                )
                .await
                {
                    Ok(object) => Ok(Value::Object(object)),
                    Err(Propagate) => {
                        if ty.is_non_null() {
                            Err(Propagate)
                        } else {
                            Ok(Value::Null)
                        }
                    }
                }
            }
        }
    }
    .boxed()
}

// [ gateway fixture ]-----------------------------------------------------

pub const POSTS_SDL: &str = r#"
    type Query {
        topPosts(limit: Int): [Post] @cacheControl(maxAge: 30)
        post(id: ID!): Post
        me: User @cacheControl(maxAge: 30, scope: PRIVATE)
    }

    type Mutation {
        updateUser(id: ID!, name: String): User
    }

    type Post {
        id: ID!
        title: String
        views: Int
        author: User
    }

    type User {
        id: ID!
        name: String
        password: String
    }
"#;

pub struct TestGateway {
    pub gateway: Gateway,
    pub top_posts_calls: Arc<AtomicUsize>,
    pub me_calls: Arc<AtomicUsize>,
    pub update_calls: Arc<AtomicUsize>,
}

fn sample_post(index: usize) -> Value {
    json!({
        "id": format!("post-{index}"),
        "title": format!("Post {index}"),
        "views": (index as i64) * 10,
        "author": {
            "id": format!("user-{}", index % 2),
            "name": format!("Author {}", index % 2),
            "password": "hunter2",
        },
    })
}

/// Authenticates from `x-user-id` and `x-roles` headers; no header means
/// anonymous.
fn header_authenticator() -> AuthenticateFn {
    Arc::new(|request: ClientRequest| {
        async move {
            match request.header("x-user-id") {
                Some(id) => {
                    let roles: Vec<String> = request
                        .header("x-roles")
                        .unwrap_or("member")
                        .split(',')
                        .map(str::to_string)
                        .collect();
                    Ok(Principal::new(id, roles))
                }
                None => Ok(Principal::anonymous()),
            }
        }
        .boxed()
    })
}

/// A blog gateway with a response cache, counting resolver invocations so
/// tests can observe cache hits and authorization short-circuits.
pub fn posts_gateway(policies: Vec<Policy>) -> TestGateway {
    let top_posts_calls = Arc::new(AtomicUsize::new(0));
    let me_calls = Arc::new(AtomicUsize::new(0));
    let update_calls = Arc::new(AtomicUsize::new(0));

    let top_posts = {
        let calls = top_posts_calls.clone();
        resolver(move |request: FieldRequest| {
            calls.fetch_add(1, Ordering::SeqCst);
            let limit = request
                .args
                .get("limit")
                .and_then(Value::as_i64)
                .unwrap_or(2) as usize;
            async move { Ok(Value::Array((0..limit).map(sample_post).collect())) }
        })
    };
    let me = {
        let calls = me_calls.clone();
        resolver(move |request: FieldRequest| {
            calls.fetch_add(1, Ordering::SeqCst);
            let id = request.context.principal.id.clone();
            async move {
                Ok(json!({
                    "id": id.unwrap_or_else(|| "anonymous".to_string()),
                    "name": "Me",
                    "password": "hunter2",
                }))
            }
        })
    };
    let update_user = {
        let calls = update_calls.clone();
        resolver(move |request: FieldRequest| {
            calls.fetch_add(1, Ordering::SeqCst);
            let id = request.args.get("id").cloned().unwrap_or(Value::Null);
            let name = request.args.get("name").cloned().unwrap_or(Value::Null);
            async move { Ok(json!({ "id": id, "name": name, "password": "hunter2" })) }
        })
    };

    let source = SchemaSource::new(POSTS_SDL)
        .resolver("Query", "topPosts", top_posts)
        .resolver("Query", "me", me)
        .resolver("Query", "post", resolver(|_| async { Ok(sample_post(1)) }))
        .resolver("Mutation", "updateUser", update_user);

    let gateway = Gateway::builder()
        .schema(source)
        .policy_engine(Arc::new(GlobPolicyEngine::new(policies)))
        .authenticate_fn(header_authenticator())
        .cache(Arc::new(InMemoryCache::new()))
        .build()
        .expect("the fixture schema composes");

    TestGateway {
        gateway,
        top_posts_calls,
        me_calls,
        update_calls,
    }
}

pub async fn anonymous_context(gateway: &Gateway) -> RequestContext {
    gateway.begin_request(ClientRequest::new()).await
}

pub async fn context_for(gateway: &Gateway, id: &str, roles: &[&str]) -> RequestContext {
    gateway
        .begin_request(
            ClientRequest::new()
                .with_header("x-user-id", id)
                .with_header("x-roles", roles.join(",")),
        )
        .await
}
