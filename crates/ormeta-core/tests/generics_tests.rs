//! Integration tests for inherited generic members

use std::sync::Arc;

use ormeta_core::types::{StaticIntrospector, TypeInfo, TypeRef};
use ormeta_core::{
    ClassDescriptor, FileDeclaration, MemberDescriptor, MemberOrigin, MetadataManager,
    PackageDeclaration, RelationKind,
};

fn generic_catalog() -> StaticIntrospector {
    StaticIntrospector::new()
        .with_type(TypeInfo::class("shop.Item").field("sku", TypeRef::named("String")))
        .with_type(
            TypeInfo::class("shop.Container")
                .type_param("T", None)
                .field("content", TypeRef::param("T"))
                .field("label", TypeRef::named("String")),
        )
        .with_type(
            TypeInfo::class("shop.Box")
                .extends(TypeRef::generic("shop.Container", vec![TypeRef::named("shop.Item")]))
                .field("depth", TypeRef::named("Integer")),
        )
        .with_type(
            TypeInfo::class("shop.Crate")
                .type_param("X", None)
                .extends(TypeRef::generic("shop.Container", vec![TypeRef::param("X")])),
        )
        .with_type(
            TypeInfo::class("shop.Pallet")
                .extends(TypeRef::generic("shop.Crate", vec![TypeRef::named("shop.Item")])),
        )
        .with_type(
            TypeInfo::class("shop.Holder")
                .type_param("K", Some(TypeRef::named("shop.Item")))
                .field("key", TypeRef::param("K")),
        )
        .with_type(TypeInfo::class("shop.RawHolder").extends(TypeRef::named("shop.Holder")))
}

fn manager_with(classes: Vec<ClassDescriptor>) -> MetadataManager {
    let manager = MetadataManager::new(Arc::new(generic_catalog()));
    let package = classes
        .into_iter()
        .fold(PackageDeclaration::new("shop"), |package, class| package.class(class));
    manager
        .register_file(FileDeclaration::new("generic.orm").package(package))
        .unwrap();
    manager
}

fn container() -> ClassDescriptor {
    // Erased to Object, so the member has to be declared persistent
    ClassDescriptor::class("Container").member(MemberDescriptor::field("content").persistent())
}

#[test]
fn test_type_argument_creates_override() {
    let manager = manager_with(vec![
        ClassDescriptor::class("Item"),
        container(),
        ClassDescriptor::class("Box"),
    ]);

    manager
        .with_descriptor("shop.Box", |class| {
            let content = class.override_of("content").unwrap();
            assert_eq!(content.origin(), MemberOrigin::TypeParameter);
            assert_eq!(content.class_name(), Some("shop.Container"));
            assert_eq!(content.resolved_type(), Some(&TypeRef::named("shop.Item")));
            assert!(content.is_persistent());
            assert_eq!(content.absolute_number(), Some(0));
        })
        .unwrap();

    manager
        .with_descriptor("shop.Container", |class| {
            let content = class.find_member("content").unwrap();
            assert_eq!(content.resolved_type(), Some(&TypeRef::any()));
            assert_eq!(content.absolute_number(), Some(0));
        })
        .unwrap();
}

#[test]
fn test_override_numbering_matches_ancestor() {
    let manager = manager_with(vec![
        ClassDescriptor::class("Item"),
        container(),
        ClassDescriptor::class("Box"),
    ]);

    let boxed = manager.get_descriptor_for("shop.Box").unwrap().unwrap();
    let model = manager.model();
    let class = model.class(boxed).unwrap();
    assert_eq!(class.inherited_managed_count(), 2);
    assert_eq!(class.override_of("content").unwrap().absolute_number(), Some(0));
    assert_eq!(class.find_member("depth").unwrap().absolute_number(), Some(2));
    assert_eq!(class.all_member_positions(), &[0, 1, 2]);
    // The pinned type makes the override a relation on the subclass only
    assert_eq!(class.relation_member_positions(), &[0]);
    let container = model.class_by_name("shop.Container").unwrap();
    assert!(container.relation_member_positions().is_empty());
}

#[test]
fn test_relation_follows_concrete_type() {
    let manager = manager_with(vec![
        ClassDescriptor::class("Item"),
        container(),
        ClassDescriptor::class("Box"),
    ]);

    assert_eq!(
        manager.relation_type("shop.Box", "content").unwrap(),
        RelationKind::OneToOneUni
    );
    assert_eq!(
        manager.relation_type("shop.Container", "content").unwrap(),
        RelationKind::None
    );
}

#[test]
fn test_declared_override_is_patched() {
    let manager = manager_with(vec![
        ClassDescriptor::class("Item"),
        container(),
        ClassDescriptor::class("Box").member(
            MemberDescriptor::field("content")
                .override_of("shop.Container")
                .dependent(true),
        ),
    ]);

    manager
        .with_descriptor("shop.Box", |class| {
            let overrides = class.overridden_members();
            assert_eq!(overrides.len(), 1);
            let content = overrides[0];
            assert_eq!(content.origin(), MemberOrigin::Declared);
            assert!(content.is_dependent());
            assert_eq!(content.resolved_type(), Some(&TypeRef::named("shop.Item")));
        })
        .unwrap();
}

#[test]
fn test_arguments_threaded_through_unregistered_ancestor() {
    let manager = manager_with(vec![
        ClassDescriptor::class("Item"),
        container(),
        ClassDescriptor::class("Pallet"),
    ]);

    manager
        .with_descriptor("shop.Pallet", |class| {
            assert_eq!(class.superclass_name(), Some("shop.Container"));
            let content = class.override_of("content").unwrap();
            assert_eq!(content.resolved_type(), Some(&TypeRef::named("shop.Item")));
        })
        .unwrap();
}

#[test]
fn test_bounded_parameter_needs_no_override() {
    let manager = manager_with(vec![
        ClassDescriptor::class("Item"),
        ClassDescriptor::class("Holder"),
        ClassDescriptor::class("RawHolder"),
    ]);

    manager
        .with_descriptor("shop.Holder", |class| {
            let key = class.find_member("key").unwrap();
            assert_eq!(key.resolved_type(), Some(&TypeRef::named("shop.Item")));
            assert!(key.is_persistent());
        })
        .unwrap();
    manager
        .with_descriptor("shop.RawHolder", |class| {
            assert!(class.overridden_members().is_empty());
            assert_eq!(class.inherited_managed_count(), 1);
        })
        .unwrap();
}
