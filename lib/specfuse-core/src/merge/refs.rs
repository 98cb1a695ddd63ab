//! Deep `$ref` rewriting and reachability collection over schema graphs.
//!
//! Two jobs, both walking the same shape: rewrite every schema reference
//! after a rename batch, and collect the transitive closure of schema names
//! actually used by paths so orphans can be pruned.
//!
//! Schema graphs may be self- or mutually-referential *by name*. The parsed
//! tree itself is acyclic (a `$ref` is a string, not an edge), so the rewrite
//! recursion is bounded by the tree; the reachability closure resolves names
//! against the component map and therefore carries a visited set.

use std::collections::{BTreeSet, VecDeque};

use indexmap::IndexMap;
use openapiv3::{
    AdditionalProperties, AnySchema, Components, MediaType, OpenAPI, Operation, Parameter,
    ParameterData, ParameterSchemaOrContent, PathItem, ReferenceOr, Response, Schema, SchemaKind,
    Type,
};

const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

/// Extracts the component name from a local schema reference.
pub(crate) fn schema_ref_name(reference: &str) -> Option<&str> {
    reference.strip_prefix(SCHEMA_REF_PREFIX)
}

/// Iterates the operations of a path item, in fixed method order.
pub(crate) fn operations(item: &PathItem) -> impl Iterator<Item = &Operation> {
    [
        item.get.as_ref(),
        item.put.as_ref(),
        item.post.as_ref(),
        item.delete.as_ref(),
        item.options.as_ref(),
        item.head.as_ref(),
        item.patch.as_ref(),
        item.trace.as_ref(),
    ]
    .into_iter()
    .flatten()
}

/// Mutable twin of [`operations`].
pub(crate) fn operations_mut(item: &mut PathItem) -> impl Iterator<Item = &mut Operation> {
    [
        item.get.as_mut(),
        item.put.as_mut(),
        item.post.as_mut(),
        item.delete.as_mut(),
        item.options.as_mut(),
        item.head.as_mut(),
        item.patch.as_mut(),
        item.trace.as_mut(),
    ]
    .into_iter()
    .flatten()
}

fn parameter_data(parameter: &Parameter) -> &ParameterData {
    match parameter {
        Parameter::Query { parameter_data, .. }
        | Parameter::Header { parameter_data, .. }
        | Parameter::Path { parameter_data, .. }
        | Parameter::Cookie { parameter_data, .. } => parameter_data,
    }
}

fn parameter_data_mut(parameter: &mut Parameter) -> &mut ParameterData {
    match parameter {
        Parameter::Query { parameter_data, .. }
        | Parameter::Header { parameter_data, .. }
        | Parameter::Path { parameter_data, .. }
        | Parameter::Cookie { parameter_data, .. } => parameter_data,
    }
}

// ---------------------------------------------------------------------------
// Rewrite
// ---------------------------------------------------------------------------

/// Rewrites every schema reference in `document` according to `renames`.
pub(crate) fn rewrite_document_refs(document: &mut OpenAPI, renames: &IndexMap<String, String>) {
    if renames.is_empty() {
        return;
    }
    for path_item in document.paths.paths.values_mut() {
        if let ReferenceOr::Item(item) = path_item {
            rewrite_path_item_refs(item, renames);
        }
    }
    if let Some(components) = document.components.as_mut() {
        for schema in components.schemas.values_mut() {
            rewrite_schema_refs(schema, renames);
        }
    }
}

fn rewrite_path_item_refs(item: &mut PathItem, renames: &IndexMap<String, String>) {
    for parameter in &mut item.parameters {
        rewrite_parameter_refs(parameter, renames);
    }
    for operation in operations_mut(item) {
        rewrite_operation_refs(operation, renames);
    }
}

fn rewrite_operation_refs(operation: &mut Operation, renames: &IndexMap<String, String>) {
    for parameter in &mut operation.parameters {
        rewrite_parameter_refs(parameter, renames);
    }
    if let Some(ReferenceOr::Item(body)) = operation.request_body.as_mut() {
        rewrite_content_refs(&mut body.content, renames);
    }
    if let Some(default) = operation.responses.default.as_mut() {
        rewrite_response_refs(default, renames);
    }
    for response in operation.responses.responses.values_mut() {
        rewrite_response_refs(response, renames);
    }
}

fn rewrite_response_refs(response: &mut ReferenceOr<Response>, renames: &IndexMap<String, String>) {
    if let ReferenceOr::Item(response) = response {
        rewrite_content_refs(&mut response.content, renames);
    }
}

fn rewrite_content_refs(
    content: &mut IndexMap<String, MediaType>,
    renames: &IndexMap<String, String>,
) {
    for media_type in content.values_mut() {
        if let Some(schema) = media_type.schema.as_mut() {
            rewrite_schema_refs(schema, renames);
        }
    }
}

fn rewrite_parameter_refs(
    parameter: &mut ReferenceOr<Parameter>,
    renames: &IndexMap<String, String>,
) {
    let ReferenceOr::Item(parameter) = parameter else {
        return;
    };
    match &mut parameter_data_mut(parameter).format {
        ParameterSchemaOrContent::Schema(schema) => rewrite_schema_refs(schema, renames),
        ParameterSchemaOrContent::Content(content) => rewrite_content_refs(content, renames),
    }
}

fn rewrite_reference(reference: &mut String, renames: &IndexMap<String, String>) {
    if let Some(new_name) = schema_ref_name(reference).and_then(|name| renames.get(name)) {
        *reference = format!("{SCHEMA_REF_PREFIX}{new_name}");
    }
}

fn rewrite_schema_refs(schema: &mut ReferenceOr<Schema>, renames: &IndexMap<String, String>) {
    match schema {
        ReferenceOr::Reference { reference } => rewrite_reference(reference, renames),
        ReferenceOr::Item(schema) => rewrite_schema_kind_refs(&mut schema.schema_kind, renames),
    }
}

fn rewrite_boxed_schema_refs(
    schema: &mut ReferenceOr<Box<Schema>>,
    renames: &IndexMap<String, String>,
) {
    match schema {
        ReferenceOr::Reference { reference } => rewrite_reference(reference, renames),
        ReferenceOr::Item(schema) => rewrite_schema_kind_refs(&mut schema.schema_kind, renames),
    }
}

fn rewrite_schema_kind_refs(kind: &mut SchemaKind, renames: &IndexMap<String, String>) {
    match kind {
        SchemaKind::Type(Type::Object(object)) => {
            for property in object.properties.values_mut() {
                rewrite_boxed_schema_refs(property, renames);
            }
            if let Some(AdditionalProperties::Schema(schema)) =
                object.additional_properties.as_mut()
            {
                rewrite_schema_refs(schema, renames);
            }
        }
        SchemaKind::Type(Type::Array(array)) => {
            if let Some(items) = array.items.as_mut() {
                rewrite_boxed_schema_refs(items, renames);
            }
        }
        SchemaKind::Type(_) => {}
        SchemaKind::OneOf { one_of } => {
            for schema in one_of {
                rewrite_schema_refs(schema, renames);
            }
        }
        SchemaKind::AllOf { all_of } => {
            for schema in all_of {
                rewrite_schema_refs(schema, renames);
            }
        }
        SchemaKind::AnyOf { any_of } => {
            for schema in any_of {
                rewrite_schema_refs(schema, renames);
            }
        }
        SchemaKind::Not { not } => rewrite_schema_refs(not, renames),
        SchemaKind::Any(any) => rewrite_any_schema_refs(any, renames),
    }
}

fn rewrite_any_schema_refs(any: &mut AnySchema, renames: &IndexMap<String, String>) {
    for property in any.properties.values_mut() {
        rewrite_boxed_schema_refs(property, renames);
    }
    if let Some(items) = any.items.as_mut() {
        rewrite_boxed_schema_refs(items, renames);
    }
    if let Some(AdditionalProperties::Schema(schema)) = any.additional_properties.as_mut() {
        rewrite_schema_refs(schema, renames);
    }
    for schema in any
        .one_of
        .iter_mut()
        .chain(any.all_of.iter_mut())
        .chain(any.any_of.iter_mut())
    {
        rewrite_schema_refs(schema, renames);
    }
    if let Some(not) = any.not.as_mut() {
        rewrite_schema_refs(not, renames);
    }
}

// ---------------------------------------------------------------------------
// Reachability
// ---------------------------------------------------------------------------

/// Names of schemas referenced directly from paths: request bodies, all
/// response media types (including the default response), and parameters at
/// both the operation and path-item level.
pub(crate) fn path_level_schema_refs(document: &OpenAPI) -> BTreeSet<String> {
    let mut used = BTreeSet::new();
    for path_item in document.paths.paths.values() {
        let ReferenceOr::Item(item) = path_item else {
            continue;
        };
        for parameter in &item.parameters {
            collect_parameter_refs(parameter, &mut used);
        }
        for operation in operations(item) {
            for parameter in &operation.parameters {
                collect_parameter_refs(parameter, &mut used);
            }
            if let Some(ReferenceOr::Item(body)) = operation.request_body.as_ref() {
                collect_content_refs(&body.content, &mut used);
            }
            if let Some(default) = operation.responses.default.as_ref() {
                collect_response_refs(default, &mut used);
            }
            for response in operation.responses.responses.values() {
                collect_response_refs(response, &mut used);
            }
        }
    }
    used
}

/// Breadth-first closure of `seeds` through the component schemas.
///
/// The visited set guarantees termination on cyclic schema graphs; dangling
/// names stay in the result and are simply never expanded.
pub(crate) fn reachable_schemas(components: &Components, seeds: BTreeSet<String>) -> BTreeSet<String> {
    let mut visited = BTreeSet::new();
    let mut queue: VecDeque<String> = seeds.into_iter().collect();
    while let Some(name) = queue.pop_front() {
        if !visited.insert(name.clone()) {
            continue;
        }
        let Some(schema) = components.schemas.get(&name) else {
            continue;
        };
        let mut found = BTreeSet::new();
        collect_schema_refs(schema, &mut found);
        for next in found {
            if !visited.contains(&next) {
                queue.push_back(next);
            }
        }
    }
    visited
}

fn collect_response_refs(response: &ReferenceOr<Response>, out: &mut BTreeSet<String>) {
    if let ReferenceOr::Item(response) = response {
        collect_content_refs(&response.content, out);
    }
}

fn collect_content_refs(content: &IndexMap<String, MediaType>, out: &mut BTreeSet<String>) {
    for media_type in content.values() {
        if let Some(schema) = media_type.schema.as_ref() {
            collect_schema_refs(schema, out);
        }
    }
}

fn collect_parameter_refs(parameter: &ReferenceOr<Parameter>, out: &mut BTreeSet<String>) {
    let ReferenceOr::Item(parameter) = parameter else {
        return;
    };
    match &parameter_data(parameter).format {
        ParameterSchemaOrContent::Schema(schema) => collect_schema_refs(schema, out),
        ParameterSchemaOrContent::Content(content) => collect_content_refs(content, out),
    }
}

fn collect_reference(reference: &str, out: &mut BTreeSet<String>) {
    if let Some(name) = schema_ref_name(reference) {
        out.insert(name.to_string());
    }
}

pub(crate) fn collect_schema_refs(schema: &ReferenceOr<Schema>, out: &mut BTreeSet<String>) {
    match schema {
        ReferenceOr::Reference { reference } => collect_reference(reference, out),
        ReferenceOr::Item(schema) => collect_schema_kind_refs(&schema.schema_kind, out),
    }
}

fn collect_boxed_schema_refs(schema: &ReferenceOr<Box<Schema>>, out: &mut BTreeSet<String>) {
    match schema {
        ReferenceOr::Reference { reference } => collect_reference(reference, out),
        ReferenceOr::Item(schema) => collect_schema_kind_refs(&schema.schema_kind, out),
    }
}

fn collect_schema_kind_refs(kind: &SchemaKind, out: &mut BTreeSet<String>) {
    match kind {
        SchemaKind::Type(Type::Object(object)) => {
            for property in object.properties.values() {
                collect_boxed_schema_refs(property, out);
            }
            if let Some(AdditionalProperties::Schema(schema)) =
                object.additional_properties.as_ref()
            {
                collect_schema_refs(schema, out);
            }
        }
        SchemaKind::Type(Type::Array(array)) => {
            if let Some(items) = array.items.as_ref() {
                collect_boxed_schema_refs(items, out);
            }
        }
        SchemaKind::Type(_) => {}
        SchemaKind::OneOf { one_of } => {
            for schema in one_of {
                collect_schema_refs(schema, out);
            }
        }
        SchemaKind::AllOf { all_of } => {
            for schema in all_of {
                collect_schema_refs(schema, out);
            }
        }
        SchemaKind::AnyOf { any_of } => {
            for schema in any_of {
                collect_schema_refs(schema, out);
            }
        }
        SchemaKind::Not { not } => collect_schema_refs(not, out),
        SchemaKind::Any(any) => collect_any_schema_refs(any, out),
    }
}

fn collect_any_schema_refs(any: &AnySchema, out: &mut BTreeSet<String>) {
    for property in any.properties.values() {
        collect_boxed_schema_refs(property, out);
    }
    if let Some(items) = any.items.as_ref() {
        collect_boxed_schema_refs(items, out);
    }
    if let Some(AdditionalProperties::Schema(schema)) = any.additional_properties.as_ref() {
        collect_schema_refs(schema, out);
    }
    for schema in any.one_of.iter().chain(&any.all_of).chain(&any.any_of) {
        collect_schema_refs(schema, out);
    }
    if let Some(not) = any.not.as_ref() {
        collect_schema_refs(not, out);
    }
}
