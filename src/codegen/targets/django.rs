//! Python / Django ORM. Helpers live in an `scd` package beside `models.py`
//! and import the model class from the parent package.

use super::GENERATED_MARKER;
use crate::codegen::pattern::{Pattern, PatternSet};
use crate::codegen::target::GenerationTarget;
use crate::core::descriptor::EntityDescriptor;

pub static TARGET: GenerationTarget = GenerationTarget {
    name: "django",
    ecosystem: "Python / Django ORM",
    description: "QuerySet builders and a versioning helper for Django models",
    location,
    header,
    mappings: &[
        (Pattern::LatestVersionQuery, render_latest_version_query),
        (Pattern::NewVersionOperation, render_new_version_operation),
    ],
};

pub fn location(desc: &EntityDescriptor) -> String {
    format!("scd/{}_scd.py", desc.snake_name())
}

pub fn header(desc: &EntityDescriptor, patterns: &PatternSet) -> String {
    let needs_latest = patterns.iter().any(|p| p == Pattern::LatestVersionQuery);
    let needs_create = patterns.iter().any(|p| p == Pattern::NewVersionOperation);

    let mut out = format!(
        "# {}\n# Source entity: {} (table {}).\n\n",
        GENERATED_MARKER, desc.name, desc.table
    );
    if needs_create {
        out.push_str("import uuid\n\nfrom django.db import IntegrityError, transaction\n");
    }
    if needs_latest {
        out.push_str("from django.db.models import Max, OuterRef, Subquery\n");
    }
    out.push_str(&format!("\nfrom ..models import {}\n", desc.name));
    out
}

pub fn render_latest_version_query(desc: &EntityDescriptor) -> String {
    format!(
        r#"
def latest_{snake}_queryset(base_queryset=None):
    """{name} rows at the highest {version} of each {id}.

    The result is a regular QuerySet; further filter() calls narrow it
    without ever returning two rows for one {id}.
    """
    qs = base_queryset if base_queryset is not None else {name}.objects.all()
    max_version = (
        {name}.objects.filter({id}=OuterRef("{id}"))
        .values("{id}")
        .annotate(max_version=Max("{version}"))
        .values("max_version")
    )
    return qs.filter({version}=Subquery(max_version))
"#,
        name = desc.name,
        snake = desc.snake_name(),
        id = desc.identity,
        version = desc.version,
    )
}

pub fn render_new_version_operation(desc: &EntityDescriptor) -> String {
    format!(
        r#"
class {name}NotFound(LookupError):
    pass


class {name}VersionConflict(Exception):
    pass


def create_new_{snake}_version(entity_id, mutate):
    """Copy the latest {name} with {id}=entity_id into a new row.

    The copy gets {version} + 1 and a fresh {token}; mutate(copy) runs before
    the insert and must not touch {id}, {version} or {token}. Raises
    {name}NotFound if no row exists and {name}VersionConflict if another
    writer inserted the same version first.
    """
    prior = (
        {name}.objects.filter({id}=entity_id).order_by("-{version}").first()
    )
    if prior is None:
        raise {name}NotFound(f"{snake} {{entity_id!r}} not found")

    prior_version = prior.{version}
    entity = prior
    entity.pk = None
    entity._state.adding = True
    entity.{token} = uuid.uuid4().hex
    entity.{version} = prior_version + 1
    minted = entity.{token}

    mutate(entity)
    if (
        entity.{id} != entity_id
        or entity.{version} != prior_version + 1
        or entity.{token} != minted
    ):
        raise ValueError("mutate must not change {id}, {version} or {token}")

    try:
        with transaction.atomic():
            entity.save(force_insert=True)
    except IntegrityError as exc:
        raise {name}VersionConflict(
            f"{snake} {{entity_id!r}} version {{entity.{version}}} already exists"
        ) from exc
    return entity
"#,
        name = desc.name,
        snake = desc.snake_name(),
        id = desc.identity,
        version = desc.version,
        token = desc.token,
    )
}
