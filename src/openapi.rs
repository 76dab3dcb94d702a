//! OpenAPI 3.1 document generated from the route table and the resolved model.

use crate::case::to_camel_case;
use crate::config::{FieldType, ResolvedField, ResolvedModel, ResolvedResource, CREATED_AT_COLUMN, ID_COLUMN, UPDATED_AT_COLUMN};
use crate::routes::table::{Action, RouteDescriptor, RouteTable, Segment, ShapeRef};
use crate::schema::{DEFAULT_LIMIT, MAX_LIMIT};
use axum::http::{Method, StatusCode};
use utoipa::openapi::path::{HttpMethod, OperationBuilder, ParameterBuilder, ParameterIn, PathItem};
use utoipa::openapi::request_body::RequestBodyBuilder;
use utoipa::openapi::extensions::ExtensionsBuilder;
use utoipa::openapi::schema::{ArrayBuilder, KnownFormat, ObjectBuilder, SchemaFormat, Type};
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityRequirement, SecurityScheme};
use utoipa::openapi::{
    ComponentsBuilder, ContentBuilder, InfoBuilder, OpenApi, OpenApiBuilder, PathsBuilder, Ref, RefOr, Required,
    ResponseBuilder, Schema,
};

const JSON: &str = "application/json";
const BEARER: &str = "bearerAuth";

fn schema_ref(name: &str) -> RefOr<Schema> {
    RefOr::Ref(Ref::from_schema_name(name))
}

fn object(builder: ObjectBuilder) -> RefOr<Schema> {
    RefOr::T(Schema::Object(builder.build()))
}

fn array_of(items: RefOr<Schema>) -> RefOr<Schema> {
    RefOr::T(Schema::Array(ArrayBuilder::new().items(items).build()))
}

fn typed(t: Type) -> ObjectBuilder {
    ObjectBuilder::new().schema_type(t)
}

fn uuid_schema() -> ObjectBuilder {
    typed(Type::String).format(Some(SchemaFormat::KnownFormat(KnownFormat::Uuid)))
}

fn timestamp_schema() -> ObjectBuilder {
    typed(Type::String).format(Some(SchemaFormat::KnownFormat(KnownFormat::DateTime)))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Variant {
    Input,
    Patch,
    Output,
}

impl Variant {
    fn component(self, title: &str) -> String {
        match self {
            Variant::Input => format!("{}Input", title),
            Variant::Patch => format!("{}Patch", title),
            Variant::Output => title.to_string(),
        }
    }
}

/// Schema of one declared field, constraints included.
fn field_schema(field: &ResolvedField, model: &ResolvedModel, variant: Variant) -> RefOr<Schema> {
    let rules = &field.rules;
    let mut b = match &field.field_type {
        FieldType::String => {
            let mut b = typed(Type::String)
                .min_length(rules.min_length.map(|n| n as usize))
                .max_length(rules.max_length.map(|n| n as usize))
                .pattern(rules.pattern.clone());
            if rules.non_empty == Some(true) && rules.min_length.is_none() {
                b = b.min_length(Some(1));
            }
            match rules.format.as_deref() {
                Some("email") => b.format(Some(SchemaFormat::Custom("email".into()))),
                Some("uuid") => b.format(Some(SchemaFormat::KnownFormat(KnownFormat::Uuid))),
                _ => b,
            }
        }
        FieldType::Number | FieldType::Integer => {
            let mut b = if matches!(field.field_type, FieldType::Integer) {
                typed(Type::Integer).format(Some(SchemaFormat::KnownFormat(KnownFormat::Int64)))
            } else {
                typed(Type::Number).format(Some(SchemaFormat::KnownFormat(KnownFormat::Double)))
            };
            b = b.minimum(rules.minimum).maximum(rules.maximum);
            if rules.positive == Some(true) {
                b = b.exclusive_minimum(Some(0.0));
            }
            b
        }
        FieldType::Boolean => typed(Type::Boolean),
        FieldType::Uuid => uuid_schema(),
        FieldType::Timestamp => timestamp_schema(),
        FieldType::Enum(values) => typed(Type::String).enum_values(Some(values.clone())),
        FieldType::Collection(c) => {
            let child_title = model.child(c).map(|r| r.title.clone()).unwrap_or_default();
            let item_variant = if variant == Variant::Output { Variant::Output } else { Variant::Input };
            let mut arr = ArrayBuilder::new()
                .items(schema_ref(&item_variant.component(&child_title)))
                .description(field.description.clone());
            if rules.non_empty == Some(true) {
                arr = arr.min_items(Some(1));
            }
            if let Some(max) = rules.max_length {
                arr = arr.max_items(Some(max as usize));
            }
            return RefOr::T(Schema::Array(arr.build()));
        }
    };
    if let Some(allowed) = &rules.allowed {
        b = b.enum_values(Some(allowed.clone()));
    }
    object(b.description(field.description.clone()))
}

fn resource_schema(resource: &ResolvedResource, model: &ResolvedModel, variant: Variant) -> RefOr<Schema> {
    let mut b = typed(Type::Object)
        .title(Some(variant.component(&resource.title)))
        .extensions(Some(ExtensionsBuilder::new().add("x-version", resource.version).build()));
    if variant == Variant::Output {
        b = b
            .description(resource.description.clone())
            .property(to_camel_case(ID_COLUMN), object(uuid_schema().read_only(Some(true))))
            .required(to_camel_case(ID_COLUMN));
    }
    for f in &resource.fields {
        b = b.property(&f.wire_name, field_schema(f, model, variant));
        let required = match variant {
            Variant::Input => f.required,
            Variant::Patch => false,
            Variant::Output => f.required || matches!(f.field_type, FieldType::Collection(_)),
        };
        if required {
            b = b.required(&f.wire_name);
        }
    }
    if variant == Variant::Output {
        if let Some(parent) = &resource.parent {
            let wire = to_camel_case(&parent.foreign_key);
            b = b.property(&wire, object(uuid_schema().read_only(Some(true)))).required(wire);
        }
        for d in &resource.derived {
            let sum = typed(Type::Number)
                .read_only(Some(true))
                .description(Some(format!("Sum of {} over {}", d.sum.factors.join(" * "), d.sum.collection)));
            b = b.property(&d.wire_name, object(sum)).required(&d.wire_name);
        }
        for ts in [CREATED_AT_COLUMN, UPDATED_AT_COLUMN] {
            let wire = to_camel_case(ts);
            b = b.property(&wire, object(timestamp_schema().read_only(Some(true)))).required(wire);
        }
    }
    object(b)
}

fn error_schema(details_required: bool) -> RefOr<Schema> {
    let mut b = typed(Type::Object)
        .property("error", object(typed(Type::String)))
        .required("error")
        .property("code", object(typed(Type::String)))
        .property("details", array_of(schema_ref("FieldError")));
    if details_required {
        b = b.required("code").required("details");
    }
    object(b)
}

fn field_error_schema() -> RefOr<Schema> {
    let reasons = [
        "type_mismatch",
        "missing",
        "empty",
        "not_positive",
        "too_small",
        "too_large",
        "too_short",
        "too_long",
        "pattern",
        "format",
        "not_allowed",
        "unknown_field",
        "read_only",
    ];
    object(
        typed(Type::Object)
            .property("field", object(typed(Type::String).description(Some("Wire path, e.g. items[1].quantity"))))
            .required("field")
            .property("reason", object(typed(Type::String).enum_values(Some(reasons))))
            .required("reason")
            .property("message", object(typed(Type::String)))
            .required("message"),
    )
}

fn list_meta_schema() -> RefOr<Schema> {
    let count = || object(typed(Type::Integer).minimum(Some(0.0)));
    object(
        typed(Type::Object)
            .property("count", count())
            .required("count")
            .property("limit", count())
            .required("limit")
            .property("offset", count())
            .required("offset"),
    )
}

fn shape_schema(shape: &ShapeRef) -> Option<(String, RefOr<Schema>)> {
    match shape {
        ShapeRef::Input(t) => Some((JSON.into(), schema_ref(&format!("{}Input", t)))),
        ShapeRef::Patch(t) => Some((JSON.into(), schema_ref(&format!("{}Patch", t)))),
        ShapeRef::Output(t) => Some((JSON.into(), schema_ref(t))),
        ShapeRef::Page(t) => Some((
            JSON.into(),
            object(
                typed(Type::Object)
                    .property("data", array_of(schema_ref(t)))
                    .required("data")
                    .property("meta", schema_ref("ListMeta"))
                    .required("meta"),
            ),
        )),
        ShapeRef::Binary { content_type } => Some((
            content_type.clone(),
            object(typed(Type::String).format(Some(SchemaFormat::KnownFormat(KnownFormat::Binary)))),
        )),
        ShapeRef::Error => Some((JSON.into(), schema_ref("Error"))),
        ShapeRef::ValidationError => Some((JSON.into(), schema_ref("ValidationError"))),
        ShapeRef::Empty => None,
    }
}

fn http_method(m: &Method) -> Option<HttpMethod> {
    Some(match *m {
        Method::GET => HttpMethod::Get,
        Method::POST => HttpMethod::Post,
        Method::PUT => HttpMethod::Put,
        Method::PATCH => HttpMethod::Patch,
        Method::DELETE => HttpMethod::Delete,
        Method::HEAD => HttpMethod::Head,
        Method::OPTIONS => HttpMethod::Options,
        _ => return None,
    })
}

fn query_param(name: &str, schema: RefOr<Schema>, description: String) -> utoipa::openapi::path::Parameter {
    ParameterBuilder::new()
        .name(name)
        .parameter_in(ParameterIn::Query)
        .required(Required::False)
        .schema(Some(schema))
        .description(Some(description))
        .build()
}

fn operation(route: &RouteDescriptor, resource: &ResolvedResource, secured: bool) -> utoipa::openapi::path::Operation {
    let mut op = OperationBuilder::new()
        .operation_id(Some(route.operation_id.clone()))
        .summary(Some(route.summary.clone()))
        .tags(Some(vec![resource.name.clone()]));

    for segment in route.path.segments() {
        if let Segment::Param(name) = segment {
            op = op.parameter(
                ParameterBuilder::new()
                    .name(name)
                    .parameter_in(ParameterIn::Path)
                    .required(Required::True)
                    .schema(Some(object(uuid_schema())))
                    .build(),
            );
        }
    }

    if route.action == Action::List {
        let paging = || typed(Type::Integer).minimum(Some(0.0));
        op = op
            .parameter(query_param(
                "limit",
                object(paging().minimum(Some(1.0)).maximum(Some(MAX_LIMIT as f64)).default(Some(DEFAULT_LIMIT.into()))),
                format!("Page size (default {}, max {})", DEFAULT_LIMIT, MAX_LIMIT),
            ))
            .parameter(query_param("offset", object(paging().default(Some(0.into()))), "Rows to skip".into()));
        op = op.parameter(query_param(&to_camel_case(ID_COLUMN), object(uuid_schema()), "Exact match".into()));
        if let Some(parent) = &resource.parent {
            op = op.parameter(query_param(
                &to_camel_case(&parent.foreign_key),
                object(uuid_schema()),
                format!("Only rows belonging to this {}", parent.resource),
            ));
        }
        for f in resource.scalar_fields() {
            let mut schema = field_schema(f, &ResolvedModel::default(), Variant::Input);
            if let RefOr::T(Schema::Object(obj)) = &mut schema {
                obj.description = None;
            }
            op = op.parameter(query_param(&f.wire_name, schema, "Exact match".into()));
        }
    }

    if let Some((content_type, schema)) = route.request.as_ref().and_then(shape_schema) {
        op = op.request_body(Some(
            RequestBodyBuilder::new()
                .content(content_type, ContentBuilder::new().schema(Some(schema)).build())
                .required(Some(Required::True))
                .build(),
        ));
    }

    for (status, shape) in &route.responses {
        let description = StatusCode::from_u16(*status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Response");
        let mut response = ResponseBuilder::new().description(description);
        if let Some((content_type, schema)) = shape_schema(shape) {
            response = response.content(content_type, ContentBuilder::new().schema(Some(schema)).build());
        }
        op = op.response(status.to_string(), RefOr::T(response.build()));
    }
    if secured {
        op = op
            .response(
                "401",
                RefOr::T(
                    ResponseBuilder::new()
                        .description("Unauthorized")
                        .content(JSON, ContentBuilder::new().schema(Some(schema_ref("Error"))).build())
                        .build(),
                ),
            )
            .security(SecurityRequirement::new(BEARER, Vec::<String>::new()));
    }
    op.build()
}

/// Build the document. `prefix` is the mount point of resource routes; `secured` adds bearer auth.
pub fn build_openapi(model: &ResolvedModel, routes: &RouteTable, prefix: &str, secured: bool) -> OpenApi {
    let mut paths = PathsBuilder::new();
    for route in routes.routes() {
        let (Some(method), Some(resource)) = (http_method(&route.method), model.resource(&route.resource)) else {
            continue;
        };
        paths = paths.path(
            format!("{}{}", prefix, route.path.as_str()),
            PathItem::new(method, operation(route, resource, secured)),
        );
    }

    let mut components = ComponentsBuilder::new()
        .schema("Error", error_schema(false))
        .schema("ValidationError", error_schema(true))
        .schema("FieldError", field_error_schema())
        .schema("ListMeta", list_meta_schema());
    for r in &model.resources {
        for variant in [Variant::Input, Variant::Patch, Variant::Output] {
            components = components.schema(variant.component(&r.title), resource_schema(r, model, variant));
        }
    }
    if secured {
        components = components.security_scheme(BEARER, SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)));
    }

    OpenApiBuilder::new()
        .info(
            InfoBuilder::new()
                .title(env!("CARGO_PKG_NAME"))
                .version(env!("CARGO_PKG_VERSION"))
                .description(Some("Generated from the resource definitions"))
                .build(),
        )
        .paths(paths.build())
        .components(Some(components.build()))
        .build()
}
