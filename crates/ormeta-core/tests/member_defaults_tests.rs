//! Integration tests for member defaulting at populate

use std::sync::Arc;

use ormeta_core::member::PERSIST_FINAL_EXTENSION;
use ormeta_core::types::{
    FieldInfo, PrimitiveType, PropertyInfo, StaticIntrospector, TypeInfo, TypeRef,
};
use ormeta_core::{
    ApiProfile, ClassDescriptor, ClassPersistence, ColumnDescriptor, ColumnType,
    ContainerDescriptor, FileDeclaration, IdentityScheme, MemberDescriptor, MetadataConfig,
    MetadataError, MetadataManager, MetadataNode, PackageDeclaration, PersistenceModifier,
    RelationKind,
};

fn string() -> TypeRef {
    TypeRef::named("String")
}

fn manager_with_config(
    catalog: StaticIntrospector,
    config: MetadataConfig,
    classes: Vec<ClassDescriptor>,
) -> MetadataManager {
    let manager = MetadataManager::with_config(Arc::new(catalog), config);
    let package = classes
        .into_iter()
        .fold(PackageDeclaration::new("shop"), |package, class| package.class(class));
    manager
        .register_file(FileDeclaration::new("shop.orm").package(package))
        .unwrap();
    manager
}

fn manager_with(catalog: StaticIntrospector, classes: Vec<ClassDescriptor>) -> MetadataManager {
    manager_with_config(catalog, MetadataConfig::default(), classes)
}

/// Runs `check` on a loaded member
fn with_member<R>(
    manager: &MetadataManager,
    class: &str,
    member: &str,
    check: impl FnOnce(&MemberDescriptor) -> R,
) -> R {
    manager
        .with_descriptor(class, |descriptor| check(descriptor.find_member(member).unwrap()))
        .unwrap()
        .unwrap()
}

fn product_catalog() -> StaticIntrospector {
    StaticIntrospector::new()
        .with_type(TypeInfo::value("shop.Picture"))
        .with_type(TypeInfo::class("shop.Supplier").field("name", string()))
        .with_type(
            TypeInfo::class("shop.Product")
                .field("id", TypeRef::primitive(PrimitiveType::Long))
                .field("name", string())
                .field("stock", TypeRef::primitive(PrimitiveType::Int))
                .field("supplier", TypeRef::named("shop.Supplier"))
                .field("tags", TypeRef::generic("List", vec![string()]))
                .field("description", string())
                .field("photo", TypeRef::named("shop.Picture"))
                .field("sku", TypeRef::array(TypeRef::primitive(PrimitiveType::Char)))
                .field_with(FieldInfo::new("cache", string()).as_transient())
                .field_with(
                    FieldInfo::new("COUNT", TypeRef::primitive(PrimitiveType::Int)).as_static(),
                )
                .field_with(FieldInfo::new("code", string()).as_final()),
        )
}

fn product_classes() -> Vec<ClassDescriptor> {
    vec![
        ClassDescriptor::class("Supplier"),
        ClassDescriptor::class("Product")
            .member(MemberDescriptor::field("id").primary_key())
            .member(MemberDescriptor::field("stock").transactional())
            .member(MemberDescriptor::field("description").large_object())
            .member(MemberDescriptor::field("photo").large_object()),
    ]
}

#[test]
fn test_persistence_modifier_defaults() {
    let manager = manager_with(product_catalog(), product_classes());

    let modifier =
        |name: &str| with_member(&manager, "shop.Product", name, |m| m.persistence_modifier());
    assert_eq!(modifier("id"), PersistenceModifier::Persistent);
    assert_eq!(modifier("name"), PersistenceModifier::Persistent);
    assert_eq!(modifier("supplier"), PersistenceModifier::Persistent);
    assert_eq!(modifier("tags"), PersistenceModifier::Persistent);
    assert_eq!(modifier("sku"), PersistenceModifier::Persistent);
    assert_eq!(modifier("stock"), PersistenceModifier::Transactional);
    assert_eq!(modifier("cache"), PersistenceModifier::None);
    assert_eq!(modifier("COUNT"), PersistenceModifier::None);
    assert_eq!(modifier("code"), PersistenceModifier::None);
}

#[test]
fn test_arrays_follow_component_type() {
    let catalog = StaticIntrospector::new()
        .with_type(
            TypeInfo::class("shop.Widget").field("size", TypeRef::primitive(PrimitiveType::Int)),
        )
        .with_type(TypeInfo::class("shop.Supplier").field("name", string()))
        .with_type(
            TypeInfo::class("shop.Shelf")
                .field("one", TypeRef::named("shop.Widget"))
                .field("many", TypeRef::array(TypeRef::named("shop.Widget")))
                .field("extras", TypeRef::array(TypeRef::named("shop.Widget")))
                .field("suppliers", TypeRef::array(TypeRef::named("shop.Supplier")))
                .field("labels", TypeRef::array(string()))
                .field("counts", TypeRef::array(TypeRef::primitive(PrimitiveType::Int))),
        );
    let manager = manager_with(
        catalog,
        vec![
            ClassDescriptor::class("Supplier"),
            ClassDescriptor::class("Shelf").member(
                MemberDescriptor::field("extras")
                    .container(ContainerDescriptor::array().element_possibly_persistent()),
            ),
        ],
    );

    let modifier =
        |name: &str| with_member(&manager, "shop.Shelf", name, |m| m.persistence_modifier());
    assert_eq!(modifier("one"), PersistenceModifier::None);
    assert_eq!(modifier("many"), PersistenceModifier::None);
    assert_eq!(modifier("extras"), PersistenceModifier::Persistent);
    assert_eq!(modifier("suppliers"), PersistenceModifier::Persistent);
    assert_eq!(modifier("labels"), PersistenceModifier::Persistent);
    assert_eq!(modifier("counts"), PersistenceModifier::Persistent);
}

#[test]
fn test_declared_implementations_must_resolve() {
    let catalog = StaticIntrospector::new()
        .with_type(TypeInfo::interface("shop.Payment"))
        .with_type(TypeInfo::class("shop.CashPayment").implements(TypeRef::named("shop.Payment")))
        .with_type(TypeInfo::class("shop.Product").field("name", string()))
        .with_type(TypeInfo::class("shop.Gadget").field("name", string()))
        .with_type(
            TypeInfo::class("shop.Note")
                .field("subject", TypeRef::any())
                .field("payment", TypeRef::named("shop.Payment")),
        );
    let note_with = |member: MemberDescriptor| {
        manager_with(
            catalog.clone(),
            vec![
                ClassDescriptor::class("Note").member(member),
                ClassDescriptor::class("Product"),
                ClassDescriptor::class("CashPayment"),
            ],
        )
    };
    let unresolvable = |manager: MetadataManager, expected: &str| {
        let err = manager.get_descriptor_for("shop.Note").unwrap_err();
        assert!(
            matches!(
                err,
                MetadataError::UnresolvableImplementation { ref type_name, .. }
                    if type_name == expected
            ),
            "{:?}",
            err
        );
    };

    // Unknown to the host runtime
    unresolvable(
        note_with(MemberDescriptor::field("subject").implementation("shop.DoesNotExist")),
        "shop.DoesNotExist",
    );
    // Known type without a persistent descriptor
    unresolvable(
        note_with(MemberDescriptor::field("subject").implementation("shop.Gadget")),
        "shop.Gadget",
    );
    // Persistent, but not an implementation of the declared interface
    unresolvable(
        note_with(MemberDescriptor::field("payment").implementation("shop.Product")),
        "shop.Product",
    );

    let manager = note_with(MemberDescriptor::field("payment").implementation("shop.CashPayment"));
    assert!(manager.get_descriptor_for("shop.Note").unwrap().is_some());
    assert_eq!(
        manager.relation_type("shop.Note", "payment").unwrap(),
        RelationKind::OneToOneUni
    );
}

#[test]
fn test_access_flags() {
    let manager = manager_with(product_catalog(), product_classes());

    let flags =
        |name: &str| with_member(&manager, "shop.Product", name, |m| m.access_flags().bits());
    // MEDIATE_WRITE | SERIALIZABLE
    assert_eq!(flags("id"), 24);
    // CHECK_READ | CHECK_WRITE | SERIALIZABLE
    assert_eq!(flags("name"), 21);
    // CHECK_WRITE | SERIALIZABLE
    assert_eq!(flags("stock"), 20);
    // MEDIATE_READ | MEDIATE_WRITE | SERIALIZABLE
    assert_eq!(flags("supplier"), 26);
    assert_eq!(flags("tags"), 26);
    assert_eq!(flags("COUNT"), 0);
    assert_eq!(flags("cache"), 0);
}

#[test]
fn test_default_fetch_group() {
    let manager = manager_with(product_catalog(), product_classes());

    let dfg =
        |name: &str| with_member(&manager, "shop.Product", name, |m| m.is_default_fetch_group());
    assert!(dfg("id"));
    assert!(dfg("name"));
    assert!(dfg("sku"));
    assert!(!dfg("supplier"));
    assert!(!dfg("tags"));
    assert!(!dfg("description"));
    assert!(!dfg("stock"));
    assert!(!dfg("cache"));
}

#[test]
fn test_large_objects() {
    let manager = manager_with(product_catalog(), product_classes());

    with_member(&manager, "shop.Product", "description", |member| {
        assert!(member.is_large_object());
        assert!(!member.is_serialized());
        assert_eq!(member.columns().len(), 1);
        assert_eq!(member.columns()[0].column_type, Some(ColumnType::LargeCharacter));
    });
    with_member(&manager, "shop.Product", "photo", |member| {
        assert!(member.is_serialized());
        assert!(member.columns().is_empty());
    });
}

#[test]
fn test_large_object_not_serialized_when_disabled() {
    let config = MetadataConfig {
        lob_serialize: false,
        ..MetadataConfig::default()
    };
    let manager = manager_with_config(product_catalog(), config, product_classes());
    assert!(!with_member(&manager, "shop.Product", "photo", |m| m.is_serialized()));
}

#[test]
fn test_persist_transient_config() {
    let config = MetadataConfig {
        persist_transient: true,
        ..MetadataConfig::default()
    };
    let manager = manager_with_config(product_catalog(), config, product_classes());

    with_member(&manager, "shop.Product", "cache", |member| {
        assert_eq!(member.persistence_modifier(), PersistenceModifier::Persistent);
        assert!(member.modifiers().is_transient);
        // CHECK_READ | CHECK_WRITE, never SERIALIZABLE
        assert_eq!(member.access_flags().bits(), 5);
    });
    // Static members stay unmanaged regardless
    assert_eq!(
        with_member(&manager, "shop.Product", "COUNT", |m| m.persistence_modifier()),
        PersistenceModifier::None
    );
}

#[test]
fn test_final_member_with_extension() {
    let mut classes = product_classes();
    classes.push(
        ClassDescriptor::class("Product")
            .member(MemberDescriptor::field("code").extension(PERSIST_FINAL_EXTENSION, "true")),
    );
    let manager = manager_with(product_catalog(), classes);

    assert_eq!(
        with_member(&manager, "shop.Product", "code", |m| m.persistence_modifier()),
        PersistenceModifier::Persistent
    );
}

#[test]
fn test_persist_final_config() {
    let config = MetadataConfig {
        persist_final: true,
        ..MetadataConfig::default()
    };
    let manager = manager_with_config(product_catalog(), config, product_classes());
    assert_eq!(
        with_member(&manager, "shop.Product", "code", |m| m.persistence_modifier()),
        PersistenceModifier::Persistent
    );
}

#[test]
fn test_explicit_modifier_conflicts() {
    let static_persistent = manager_with(
        product_catalog(),
        vec![ClassDescriptor::class("Product")
            .member(MemberDescriptor::field("COUNT").persistent())],
    );
    assert!(matches!(
        static_persistent.get_descriptor_for("shop.Product"),
        Err(MetadataError::InvalidMember { ref member, .. }) if member == "COUNT"
    ));

    let final_persistent = manager_with(
        product_catalog(),
        vec![ClassDescriptor::class("Product")
            .member(MemberDescriptor::field("code").persistent())],
    );
    assert!(matches!(
        final_persistent.get_descriptor_for("shop.Product"),
        Err(MetadataError::InvalidMember { ref member, .. }) if member == "code"
    ));

    let transactional_key = manager_with(
        product_catalog(),
        vec![ClassDescriptor::class("Product")
            .member(MemberDescriptor::field("id").primary_key().transactional())],
    );
    assert!(matches!(
        transactional_key.get_descriptor_for("shop.Product"),
        Err(MetadataError::InvalidMember { ref member, .. }) if member == "id"
    ));
}

#[test]
fn test_missing_members() {
    let catalog = StaticIntrospector::new().with_type(
        TypeInfo::class("shop.Customer")
            .field("name", string())
            .property_with(PropertyInfo::read_only("age", TypeRef::primitive(PrimitiveType::Int))),
    );

    let ghost = manager_with(
        catalog.clone(),
        vec![ClassDescriptor::class("Customer").member(MemberDescriptor::field("ghost"))],
    );
    assert!(matches!(
        ghost.get_descriptor_for("shop.Customer"),
        Err(MetadataError::MissingMember { ref member, .. }) if member == "ghost"
    ));

    let read_only = manager_with(
        catalog,
        vec![ClassDescriptor::class("Customer").member(MemberDescriptor::property("age"))],
    );
    let err = read_only.get_descriptor_for("shop.Customer").unwrap_err();
    assert!(matches!(
        err,
        MetadataError::MissingMember { ref reason, .. } if reason.contains("setter")
    ));
}

#[test]
fn test_not_null_columns() {
    let config = MetadataConfig {
        default_nullable: false,
        ..MetadataConfig::default()
    };
    let mut classes = product_classes();
    classes.push(
        ClassDescriptor::class("Product").member(
            MemberDescriptor::field("name").column(ColumnDescriptor::named("PRODUCT_NAME")),
        ),
    );
    let manager = manager_with_config(product_catalog(), config, classes);

    with_member(&manager, "shop.Product", "supplier", |member| {
        assert_eq!(member.columns().len(), 1);
        assert_eq!(member.columns()[0].allows_null, Some(false));
    });
    // Declared columns are kept as they are
    with_member(&manager, "shop.Product", "name", |member| {
        assert_eq!(member.columns()[0].name.as_deref(), Some("PRODUCT_NAME"));
        assert_eq!(member.columns()[0].allows_null, None);
    });
    // Unmanaged members get no column
    assert!(with_member(&manager, "shop.Product", "cache", |m| m.columns().is_empty()));
}

#[test]
fn test_cascade_defaults_follow_api_profile() {
    let classes = || {
        vec![
            ClassDescriptor::class("Supplier"),
            ClassDescriptor::class("Product")
                .member(MemberDescriptor::field("id").primary_key())
                .member(MemberDescriptor::field("supplier").cascade_delete(true)),
        ]
    };

    let jdo = manager_with(product_catalog(), classes());
    with_member(&jdo, "shop.Product", "supplier", |member| {
        let cascade = member.cascade();
        assert_eq!(cascade.persist, Some(true));
        assert_eq!(cascade.delete, Some(true));
        assert_eq!(cascade.detach, Some(false));
    });

    let config = MetadataConfig {
        api: ApiProfile::Jpa,
        ..MetadataConfig::default()
    };
    let jpa = manager_with_config(product_catalog(), config, classes());
    with_member(&jpa, "shop.Product", "supplier", |member| {
        let cascade = member.cascade();
        assert_eq!(cascade.persist, Some(false));
        assert_eq!(cascade.delete, Some(true));
    });
}

#[test]
fn test_embedded_member_descriptor() {
    let catalog = StaticIntrospector::new()
        .with_type(
            TypeInfo::class("shop.Address")
                .field("street", string())
                .field("city", string()),
        )
        .with_type(
            TypeInfo::class("shop.Customer")
                .field("name", string())
                .field("address", TypeRef::named("shop.Address")),
        );
    let manager = manager_with(
        catalog,
        vec![
            ClassDescriptor::class("Address")
                .embedded_only()
                .member(MemberDescriptor::field("city").default_fetch_group(false)),
            ClassDescriptor::class("Customer"),
        ],
    );

    with_member(&manager, "shop.Customer", "address", |member| {
        assert!(member.is_embedded());
        assert!(member.is_persistent());
        let embedded = member.embedded_descriptor().unwrap();
        assert_eq!(embedded.owner_type(), "shop.Address");
        let names: Vec<&str> = embedded.members().iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["city", "street"]);
        // Declared attributes of the embedded type carry over
        assert!(!embedded.find_member("city").unwrap().is_default_fetch_group());
        assert!(embedded.find_member("street").unwrap().is_default_fetch_group());
        assert!(embedded.header().is_initialised());
    });

    let address = manager.get_descriptor_for("shop.Address").unwrap().unwrap();
    let model = manager.model();
    assert_eq!(model.class(address).unwrap().identity_scheme(), IdentityScheme::None);
}

#[test]
fn test_recursive_embedding_is_cut() {
    let catalog = StaticIntrospector::new()
        .with_type(
            TypeInfo::class("shop.Outer")
                .field("label", string())
                .field("inner", TypeRef::named("shop.Inner")),
        )
        .with_type(
            TypeInfo::class("shop.Inner")
                .field("outer", TypeRef::named("shop.Outer"))
                .field("note", string()),
        )
        .with_type(TypeInfo::class("shop.Person").field("partner", TypeRef::named("shop.Person")));
    let manager = manager_with(
        catalog,
        vec![
            ClassDescriptor::class("Outer"),
            ClassDescriptor::class("Inner")
                .embedded_only()
                .member(MemberDescriptor::field("outer").embedded(true)),
            ClassDescriptor::class("Person")
                .member(MemberDescriptor::field("partner").embedded(true)),
        ],
    );

    with_member(&manager, "shop.Outer", "inner", |member| {
        let inner = member.embedded_descriptor().unwrap();
        let outer = inner.find_member("outer").unwrap();
        assert!(outer.is_embedded());
        assert!(outer.embedded_descriptor().is_none());
    });
    with_member(&manager, "shop.Person", "partner", |member| {
        assert!(member.is_embedded());
        assert!(member.embedded_descriptor().is_none());
    });
}

#[test]
fn test_non_capable_classes_are_not_numbered() {
    let catalog = StaticIntrospector::new()
        .with_type(TypeInfo::class("shop.Report").field("title", string()));
    let manager = manager_with(
        catalog,
        vec![ClassDescriptor::class("Report").with_persistence(ClassPersistence::PersistenceAware)],
    );

    assert!(!manager.is_class_persistent("shop.Report").unwrap());
    manager
        .with_descriptor("shop.Report", |report| {
            assert!(report.members().is_empty());
            assert_eq!(report.member_count(), 0);
        })
        .unwrap();
}

#[test]
fn test_property_access_synthesizes_accessor_members() {
    let catalog = StaticIntrospector::new().with_type(
        TypeInfo::class("shop.Customer")
            .field("internal", string())
            .property("name", string())
            .property("email", string()),
    );
    let manager = manager_with(catalog, vec![ClassDescriptor::class("Customer").property_access()]);

    manager
        .with_descriptor("shop.Customer", |customer| {
            let names: Vec<&str> = customer.members().iter().map(|m| m.name()).collect();
            assert_eq!(names, vec!["email", "name"]);
            assert!(customer.members().iter().all(|m| m.is_property()));
        })
        .unwrap();
}

#[test]
fn test_resolution_is_deterministic() {
    let forward = manager_with(product_catalog(), product_classes());
    let mut reversed_classes = product_classes();
    reversed_classes.reverse();
    let reversed = manager_with(product_catalog(), reversed_classes);

    forward.initialise_all().unwrap();
    reversed.initialise_all().unwrap();
    assert_eq!(
        forward.summary().to_json().unwrap(),
        reversed.summary().to_json().unwrap()
    );
}
