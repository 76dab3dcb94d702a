//! Immutable route table built once from the resolved model.
//!
//! Matching: a path matches a pattern only with the same number of segments. Among patterns that
//! match, literal segments outrank `{param}` segments, compared left to right; remaining ties go to
//! the route registered first. A matched path with no route for the method yields 405.

use crate::config::{Operation, ResolvedModel, ResolvedResource};
use crate::error::ConfigError;
use axum::http::Method;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Clone, Debug)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

fn split(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

impl PathPattern {
    pub fn parse(path: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        for s in split(path) {
            if let Some(inner) = s.strip_prefix('{') {
                let name = inner.strip_suffix('}').ok_or_else(|| format!("unclosed parameter '{}'", s))?;
                if name.is_empty() || name.contains(['{', '}']) {
                    return Err(format!("invalid parameter '{}'", s));
                }
                if segments.iter().any(|seg| matches!(seg, Segment::Param(p) if p == name)) {
                    return Err(format!("duplicate parameter '{}'", name));
                }
                segments.push(Segment::Param(name.to_string()));
            } else if s.contains(['{', '}']) {
                return Err(format!("invalid segment '{}'", s));
            } else {
                segments.push(Segment::Literal(s.to_string()));
            }
        }
        Ok(PathPattern {
            raw: format!("/{}", split(path).join("/")),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    fn matches(&self, parts: &[&str]) -> Option<HashMap<String, String>> {
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut params = HashMap::new();
        for (seg, part) in self.segments.iter().zip(parts) {
            match seg {
                Segment::Literal(l) if l == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), (*part).to_string());
                }
            }
        }
        Some(params)
    }

    /// Literal beats parameter at the first position where the two differ.
    fn specificity(&self, other: &PathPattern) -> Ordering {
        for (a, b) in self.segments.iter().zip(&other.segments) {
            match (a, b) {
                (Segment::Literal(_), Segment::Param(_)) => return Ordering::Greater,
                (Segment::Param(_), Segment::Literal(_)) => return Ordering::Less,
                _ => {}
            }
        }
        Ordering::Equal
    }

    /// Same shape regardless of parameter names: `/a/{id}` and `/a/{key}` collide.
    fn same_structure(&self, other: &PathPattern) -> bool {
        self.segments.len() == other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|pair| match pair {
                (Segment::Literal(a), Segment::Literal(b)) => a == b,
                (Segment::Param(_), Segment::Param(_)) => true,
                _ => false,
            })
    }
}

/// What a route does once matched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    List,
    /// Render the named artifact of one entity.
    Render(String),
}

impl Action {
    pub fn name(&self) -> &str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::List => "list",
            Action::Render(artifact) => artifact,
        }
    }
}

/// Reference to a payload shape, resolved to a component schema by the docs generator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShapeRef {
    /// Input schema of a resource (component `<Title>Input`).
    Input(String),
    /// Partial schema (component `<Title>Patch`).
    Patch(String),
    /// Output schema (component `<Title>`).
    Output(String),
    /// `{data: [<Title>], meta}` envelope.
    Page(String),
    Binary { content_type: String },
    Error,
    ValidationError,
    Empty,
}

#[derive(Clone, Debug)]
pub struct RouteDescriptor {
    pub method: Method,
    pub path: PathPattern,
    pub operation_id: String,
    pub summary: String,
    pub resource: String,
    pub action: Action,
    pub request: Option<ShapeRef>,
    pub responses: BTreeMap<u16, ShapeRef>,
}

pub struct RouteMatch<'a> {
    pub route: &'a RouteDescriptor,
    pub params: HashMap<String, String>,
}

pub enum Lookup<'a> {
    Found(RouteMatch<'a>),
    /// Path matched but not for this method; carries the allowed methods.
    MethodNotAllowed(Vec<String>),
    NotFound,
}

#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    routes: Vec<RouteDescriptor>,
}

fn responses(pairs: &[(u16, ShapeRef)]) -> BTreeMap<u16, ShapeRef> {
    let mut out: BTreeMap<u16, ShapeRef> = pairs.iter().cloned().collect();
    out.insert(500, ShapeRef::Error);
    out.insert(503, ShapeRef::Error);
    out
}

fn resource_routes(resource: &ResolvedResource) -> Result<Vec<RouteDescriptor>, ConfigError> {
    let title = &resource.title;
    let collection = format!("/{}", resource.path_segment);
    let item = format!("/{}/{{id}}", resource.path_segment);
    let mut routes = Vec::new();

    let mut add = |method: Method, path: &str, action: Action, summary: String, request: Option<ShapeRef>, resp: &[(u16, ShapeRef)]| {
        let pattern = PathPattern::parse(path).map_err(|reason| ConfigError::InvalidRoute {
            method: method.to_string(),
            path: path.to_string(),
            reason,
        })?;
        routes.push(RouteDescriptor {
            operation_id: format!("{}_{}", action.name(), resource.name),
            method,
            path: pattern,
            summary,
            resource: resource.name.clone(),
            action,
            request,
            responses: responses(resp),
        });
        Ok::<_, ConfigError>(())
    };

    for op in &resource.operations {
        match op {
            Operation::List => add(
                Method::GET,
                &collection,
                Action::List,
                format!("List {}", resource.name),
                None,
                &[(200, ShapeRef::Page(title.clone())), (400, ShapeRef::ValidationError)],
            )?,
            Operation::Create => add(
                Method::POST,
                &collection,
                Action::Create,
                format!("Create a {} entry", resource.name),
                Some(ShapeRef::Input(title.clone())),
                &[
                    (201, ShapeRef::Output(title.clone())),
                    (400, ShapeRef::ValidationError),
                    (409, ShapeRef::Error),
                ],
            )?,
            Operation::Read => add(
                Method::GET,
                &item,
                Action::Read,
                format!("Fetch one {} entry", resource.name),
                None,
                &[(200, ShapeRef::Output(title.clone())), (404, ShapeRef::Error)],
            )?,
            Operation::Update => add(
                Method::PATCH,
                &item,
                Action::Update,
                format!("Partially update a {} entry", resource.name),
                Some(ShapeRef::Patch(title.clone())),
                &[
                    (200, ShapeRef::Output(title.clone())),
                    (400, ShapeRef::ValidationError),
                    (404, ShapeRef::Error),
                    (409, ShapeRef::Error),
                ],
            )?,
            Operation::Delete => add(
                Method::DELETE,
                &item,
                Action::Delete,
                format!("Delete a {} entry", resource.name),
                None,
                &[(204, ShapeRef::Empty), (404, ShapeRef::Error), (409, ShapeRef::Error)],
            )?,
        }
    }
    for artifact in &resource.artifacts {
        add(
            Method::GET,
            &format!("/{}/{{id}}/{}", resource.path_segment, artifact.name),
            Action::Render(artifact.name.clone()),
            format!("Render the {} artifact of a {} entry", artifact.name, resource.name),
            None,
            &[
                (
                    200,
                    ShapeRef::Binary {
                        content_type: artifact.content_type.clone(),
                    },
                ),
                (404, ShapeRef::Error),
                (502, ShapeRef::Error),
            ],
        )?;
    }
    Ok(routes)
}

impl RouteTable {
    /// Routes for every enabled operation and artifact of every resource.
    pub fn build(model: &ResolvedModel) -> Result<Self, ConfigError> {
        let mut routes = Vec::new();
        for r in &model.resources {
            routes.extend(resource_routes(r)?);
        }
        Self::from_routes(routes)
    }

    /// Reject a route whose method and path structure repeat an earlier one.
    pub fn from_routes(routes: Vec<RouteDescriptor>) -> Result<Self, ConfigError> {
        for (i, r) in routes.iter().enumerate() {
            if let Some(prev) = routes[..i]
                .iter()
                .find(|p| p.method == r.method && p.path.same_structure(&r.path))
            {
                return Err(ConfigError::InvalidRoute {
                    method: r.method.to_string(),
                    path: r.path.as_str().to_string(),
                    reason: format!("conflicts with {} {}", prev.method, prev.path.as_str()),
                });
            }
        }
        Ok(RouteTable { routes })
    }

    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes
    }

    pub fn find(&self, method: &Method, path: &str) -> Lookup<'_> {
        let parts = split(path);
        let mut best: Option<RouteMatch<'_>> = None;
        let mut allow: Vec<String> = Vec::new();
        for route in &self.routes {
            let Some(params) = route.path.matches(&parts) else {
                continue;
            };
            if route.method != *method {
                let m = route.method.to_string();
                if !allow.contains(&m) {
                    allow.push(m);
                }
                continue;
            }
            let better = match &best {
                None => true,
                Some(b) => route.path.specificity(&b.route.path) == Ordering::Greater,
            };
            if better {
                best = Some(RouteMatch { route, params });
            }
        }
        match best {
            Some(m) => Lookup::Found(m),
            None if !allow.is_empty() => {
                allow.sort();
                Lookup::MethodNotAllowed(allow)
            }
            None => Lookup::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_model;

    fn route(method: Method, path: &str, id: &str) -> RouteDescriptor {
        RouteDescriptor {
            method,
            path: PathPattern::parse(path).expect("pattern"),
            operation_id: id.to_string(),
            summary: String::new(),
            resource: "products".into(),
            action: Action::Read,
            request: None,
            responses: BTreeMap::new(),
        }
    }

    fn found<'a>(table: &'a RouteTable, method: Method, path: &str) -> &'a RouteDescriptor {
        match table.find(&method, path) {
            Lookup::Found(m) => m.route,
            _ => panic!("no route for {} {}", method, path),
        }
    }

    #[test]
    fn literal_segments_outrank_parameters() {
        let table = RouteTable::from_routes(vec![
            route(Method::GET, "/products/{id}", "by_id"),
            route(Method::GET, "/products/featured", "featured"),
            route(Method::GET, "/{kind}/featured", "any_featured"),
        ])
        .expect("table");
        assert_eq!(found(&table, Method::GET, "/products/featured").operation_id, "featured");
        assert_eq!(found(&table, Method::GET, "/products/42").operation_id, "by_id");
        assert_eq!(found(&table, Method::GET, "/orders/featured").operation_id, "any_featured");
        // deterministic across repeated lookups
        for _ in 0..10 {
            assert_eq!(found(&table, Method::GET, "/products/featured").operation_id, "featured");
        }
    }

    #[test]
    fn segment_count_must_match() {
        let table = RouteTable::from_routes(vec![route(Method::GET, "/products/{id}", "by_id")]).expect("table");
        assert!(matches!(table.find(&Method::GET, "/products"), Lookup::NotFound));
        assert!(matches!(table.find(&Method::GET, "/products/1/extra"), Lookup::NotFound));
        assert!(matches!(table.find(&Method::GET, "/products/1/"), Lookup::Found(_)));
    }

    #[test]
    fn wrong_method_reports_allowed_methods() {
        let table = RouteTable::build(&sample_model()).expect("table");
        match table.find(&Method::PUT, "/products/0b6f6a4e-5d1c-4e5b-9a53-3f1e2d4c5b6a") {
            Lookup::MethodNotAllowed(allow) => assert_eq!(allow, ["DELETE", "GET", "PATCH"]),
            _ => panic!("expected 405"),
        }
    }

    #[test]
    fn structural_duplicates_are_rejected() {
        let err = RouteTable::from_routes(vec![
            route(Method::GET, "/products/{id}", "a"),
            route(Method::GET, "/products/{key}", "b"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRoute { .. }));
        assert!(RouteTable::from_routes(vec![
            route(Method::GET, "/products/{id}", "a"),
            route(Method::DELETE, "/products/{id}", "b"),
        ])
        .is_ok());
    }

    #[test]
    fn build_follows_enabled_operations() {
        let table = RouteTable::build(&sample_model()).expect("table");
        let ids: Vec<&str> = table.routes().iter().map(|r| r.operation_id.as_str()).collect();
        assert!(ids.contains(&"create_products"));
        assert!(ids.contains(&"pdf_invoices"));
        assert!(ids.contains(&"list_invoice_items"));
        assert!(!ids.contains(&"create_invoice_items"));

        let render = found(&table, Method::GET, "/invoices/0b6f6a4e-5d1c-4e5b-9a53-3f1e2d4c5b6a/pdf");
        assert_eq!(render.action, Action::Render("pdf".into()));
        assert_eq!(render.responses.get(&502), Some(&ShapeRef::Error));
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        assert!(PathPattern::parse("/a/{id").is_err());
        assert!(PathPattern::parse("/a/{}").is_err());
        assert!(PathPattern::parse("/a/{id}/{id}").is_err());
        assert_eq!(PathPattern::parse("a//b/").expect("pattern").as_str(), "/a/b");
    }
}
