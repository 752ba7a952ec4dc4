//! Integration tests for relation resolution
//!
//! Each test registers a small shop model and asks the manager for relation
//! types and counterparts.

use std::sync::Arc;

use ormeta_core::types::{PrimitiveType, StaticIntrospector, TypeInfo, TypeRef};
use ormeta_core::{
    ClassDescriptor, ContainerDescriptor, FileDeclaration, JoinDescriptor, MemberDescriptor,
    MetadataError, MetadataManager, PackageDeclaration, RelationKind, RelationResolver,
};

fn list_of(name: &str) -> TypeRef {
    TypeRef::generic("List", vec![TypeRef::named(name)])
}

fn set_of(name: &str) -> TypeRef {
    TypeRef::generic("Set", vec![TypeRef::named(name)])
}

fn manager_with(catalog: StaticIntrospector, classes: Vec<ClassDescriptor>) -> MetadataManager {
    let manager = MetadataManager::new(Arc::new(catalog));
    let package = classes
        .into_iter()
        .fold(PackageDeclaration::new("shop"), |package, class| package.class(class));
    manager
        .register_file(FileDeclaration::new("shop.orm").package(package))
        .unwrap();
    manager
}

fn order_catalog() -> StaticIntrospector {
    StaticIntrospector::new()
        .with_type(
            TypeInfo::class("shop.Order")
                .field("items", list_of("shop.LineItem"))
                .field("number", TypeRef::primitive(PrimitiveType::Long))
                .field("tags", list_of("String")),
        )
        .with_type(
            TypeInfo::class("shop.LineItem")
                .field("order", TypeRef::named("shop.Order"))
                .field("product", TypeRef::named("shop.Product"))
                .field("quantity", TypeRef::primitive(PrimitiveType::Int)),
        )
        .with_type(TypeInfo::class("shop.Product").field("name", TypeRef::named("String")))
}

fn order_manager() -> MetadataManager {
    manager_with(
        order_catalog(),
        vec![
            ClassDescriptor::class("Order"),
            ClassDescriptor::class("LineItem")
                .member(MemberDescriptor::field("order").mapped_by("items"))
                .member(
                    MemberDescriptor::field("product")
                        .join(JoinDescriptor::table("LINE_PRODUCT")),
                ),
            ClassDescriptor::class("Product"),
        ],
    )
}

#[test]
fn test_one_to_many_bidirectional() {
    let manager = order_manager();

    assert_eq!(
        manager.relation_type("shop.Order", "items").unwrap(),
        RelationKind::OneToManyBi
    );
    assert_eq!(
        manager.relation_type("shop.LineItem", "order").unwrap(),
        RelationKind::ManyToOneBi
    );

    let items = manager.member_ref("shop.Order", "items").unwrap();
    let order = manager.member_ref("shop.LineItem", "order").unwrap();
    assert_eq!(manager.counterparts("shop.Order", "items").unwrap(), vec![order]);
    assert_eq!(manager.counterparts("shop.LineItem", "order").unwrap(), vec![items]);
}

#[test]
fn test_bidirectional_relations_are_symmetric() {
    let manager = order_manager();
    manager.initialise_all().unwrap();

    let members: Vec<(String, String)> = {
        let model = manager.model();
        model
            .classes()
            .flat_map(|(_, class)| {
                class
                    .members()
                    .iter()
                    .map(|m| (class.full_name().to_string(), m.name().to_string()))
                    .collect::<Vec<_>>()
            })
            .collect()
    };

    for (class, member) in members {
        let relation = manager.relation(&class, &member).unwrap();
        if !relation.kind.is_bidirectional() {
            continue;
        }
        let this = manager.member_ref(&class, &member).unwrap();
        for counterpart in relation.counterparts {
            let (other_class, other_member) = {
                let model = manager.model();
                let owner = model.class(counterpart.class).unwrap().full_name().to_string();
                let name = model.member(counterpart).unwrap().name().to_string();
                (owner, name)
            };
            let back = manager.counterparts(&other_class, &other_member).unwrap();
            assert!(
                back.contains(&this),
                "{}.{} is not a counterpart of {}.{}",
                class,
                member,
                other_class,
                other_member
            );
        }
    }
}

#[test]
fn test_join_makes_scalar_many_to_one() {
    let manager = order_manager();
    assert_eq!(
        manager.relation_type("shop.LineItem", "product").unwrap(),
        RelationKind::ManyToOneUni
    );
    assert!(manager.counterparts("shop.LineItem", "product").unwrap().is_empty());
}

#[test]
fn test_non_relations() {
    let manager = order_manager();
    // Container of values
    assert_eq!(manager.relation_type("shop.Order", "tags").unwrap(), RelationKind::None);
    // Primitive and value scalars
    assert_eq!(manager.relation_type("shop.Order", "number").unwrap(), RelationKind::None);
    assert_eq!(manager.relation_type("shop.Product", "name").unwrap(), RelationKind::None);
}

#[test]
fn test_unidirectional_fallbacks() {
    let catalog = StaticIntrospector::new()
        .with_type(
            TypeInfo::class("shop.Customer")
                .field("favourite", TypeRef::named("shop.Product"))
                .field("history", list_of("shop.Product"))
                .field(
                    "address",
                    TypeRef::generic("Optional", vec![TypeRef::named("shop.Address")]),
                ),
        )
        .with_type(TypeInfo::class("shop.Product").field("name", TypeRef::named("String")))
        .with_type(TypeInfo::class("shop.Address").field("street", TypeRef::named("String")));
    let manager = manager_with(
        catalog,
        vec![
            ClassDescriptor::class("Customer"),
            ClassDescriptor::class("Product"),
            ClassDescriptor::class("Address"),
        ],
    );

    assert_eq!(
        manager.relation_type("shop.Customer", "favourite").unwrap(),
        RelationKind::OneToOneUni
    );
    assert_eq!(
        manager.relation_type("shop.Customer", "history").unwrap(),
        RelationKind::OneToManyUni
    );
    assert_eq!(
        manager.relation_type("shop.Customer", "address").unwrap(),
        RelationKind::OneToOneUni
    );
}

#[test]
fn test_many_to_many() {
    let catalog = StaticIntrospector::new()
        .with_type(TypeInfo::class("shop.Student").field("courses", set_of("shop.Course")))
        .with_type(TypeInfo::class("shop.Course").field("students", set_of("shop.Student")));
    let manager = manager_with(
        catalog,
        vec![
            ClassDescriptor::class("Student"),
            ClassDescriptor::class("Course")
                .member(MemberDescriptor::field("students").mapped_by("courses")),
        ],
    );

    assert_eq!(
        manager.relation_type("shop.Student", "courses").unwrap(),
        RelationKind::ManyToManyBi
    );
    assert_eq!(
        manager.relation_type("shop.Course", "students").unwrap(),
        RelationKind::ManyToManyBi
    );
}

#[test]
fn test_one_to_one_bidirectional() {
    let catalog = StaticIntrospector::new()
        .with_type(TypeInfo::class("shop.Account").field("profile", TypeRef::named("shop.Profile")))
        .with_type(
            TypeInfo::class("shop.Profile").field("account", TypeRef::named("shop.Account")),
        );
    let manager = manager_with(
        catalog,
        vec![
            ClassDescriptor::class("Account"),
            ClassDescriptor::class("Profile")
                .member(MemberDescriptor::field("account").mapped_by("profile")),
        ],
    );

    assert_eq!(
        manager.relation_type("shop.Account", "profile").unwrap(),
        RelationKind::OneToOneBi
    );
    assert_eq!(
        manager.relation_type("shop.Profile", "account").unwrap(),
        RelationKind::OneToOneBi
    );
}

#[test]
fn test_missing_counterpart_name_is_fatal() {
    let manager = manager_with(
        order_catalog(),
        vec![
            ClassDescriptor::class("Order"),
            ClassDescriptor::class("LineItem")
                .member(MemberDescriptor::field("order").mapped_by("lines")),
            ClassDescriptor::class("Product"),
        ],
    );

    let err = manager.relation_type("shop.LineItem", "order").unwrap_err();
    assert!(matches!(
        err,
        MetadataError::InvalidCounterpart { ref counterpart, ref other, .. }
            if counterpart == "lines" && other == "shop.Order"
    ));
}

#[test]
fn test_multiple_counterparts_collected() {
    let catalog = StaticIntrospector::new()
        .with_type(TypeInfo::class("shop.Owner").field("pets", list_of("shop.Pet")))
        .with_type(
            TypeInfo::class("shop.Pet")
                .field("owner", TypeRef::named("shop.Owner"))
                .field("sitter", TypeRef::named("shop.Owner")),
        );
    let catalog = Arc::new(catalog);
    let manager = MetadataManager::new(catalog.clone());
    manager
        .register_file(
            FileDeclaration::new("pets.orm").package(
                PackageDeclaration::new("shop")
                    .class(ClassDescriptor::class("Owner"))
                    .class(
                        ClassDescriptor::class("Pet")
                            .member(MemberDescriptor::field("owner").mapped_by("pets"))
                            .member(MemberDescriptor::field("sitter").mapped_by("pets")),
                    ),
            ),
        )
        .unwrap();

    let relation = manager.relation("shop.Owner", "pets").unwrap();
    assert_eq!(relation.kind, RelationKind::OneToManyBi);

    let owner = manager.member_ref("shop.Pet", "owner").unwrap();
    let sitter = manager.member_ref("shop.Pet", "sitter").unwrap();
    assert_eq!(relation.counterparts, vec![owner, sitter]);

    let pets = manager.member_ref("shop.Owner", "pets").unwrap();
    let model = manager.model();
    let resolver = RelationResolver::new(&model, &*catalog);
    assert_eq!(
        resolver.related_member_for_type(pets, "shop.Pet").unwrap(),
        Some(owner)
    );
}

#[test]
fn test_interface_without_implementation_is_unresolvable() {
    let catalog = StaticIntrospector::new()
        .with_type(TypeInfo::interface("shop.Payment"))
        .with_type(
            TypeInfo::class("shop.Invoice").field("payment", TypeRef::named("shop.Payment")),
        );
    let manager = manager_with(catalog, vec![ClassDescriptor::class("Invoice")]);

    let err = manager.relation_type("shop.Invoice", "payment").unwrap_err();
    assert!(matches!(
        err,
        MetadataError::UnresolvableImplementation { ref class, ref member, ref type_name }
            if class == "shop.Invoice" && member == "payment" && type_name == "shop.Payment"
    ));
}

#[test]
fn test_interface_resolved_through_registered_implementation() {
    let catalog = StaticIntrospector::new()
        .with_type(TypeInfo::interface("shop.Payment"))
        .with_type(
            TypeInfo::class("shop.CardPayment")
                .implements(TypeRef::named("shop.Payment"))
                .field("last4", TypeRef::named("String")),
        )
        .with_type(
            TypeInfo::class("shop.Invoice").field("payment", TypeRef::named("shop.Payment")),
        );
    let manager = manager_with(
        catalog,
        vec![ClassDescriptor::class("Invoice"), ClassDescriptor::class("CardPayment")],
    );

    assert_eq!(
        manager.relation_type("shop.Invoice", "payment").unwrap(),
        RelationKind::OneToOneUni
    );
}

#[test]
fn test_interface_collection_counts_as_relation() {
    let catalog = StaticIntrospector::new()
        .with_type(TypeInfo::interface("shop.Payment"))
        .with_type(TypeInfo::interface("shop.Coupon"))
        .with_type(
            TypeInfo::class("shop.CardPayment")
                .implements(TypeRef::named("shop.Payment"))
                .field("last4", TypeRef::named("String")),
        )
        .with_type(
            TypeInfo::class("shop.Wallet")
                .field("cards", list_of("shop.Payment"))
                .field("coupons", list_of("shop.Coupon")),
        );
    let manager = manager_with(
        catalog,
        vec![ClassDescriptor::class("Wallet"), ClassDescriptor::class("CardPayment")],
    );

    manager
        .with_descriptor("shop.Wallet", |wallet| {
            assert!(wallet.find_member("cards").unwrap().may_be_relation());
            assert!(!wallet.find_member("coupons").unwrap().may_be_relation());
            assert_eq!(wallet.relation_member_positions(), &[0]);
        })
        .unwrap();
    assert_eq!(
        manager.relation_type("shop.Wallet", "cards").unwrap(),
        RelationKind::OneToManyUni
    );
    assert_eq!(
        manager.relation_type("shop.Wallet", "coupons").unwrap(),
        RelationKind::None
    );
}

#[test]
fn test_object_member_uses_declared_implementation() {
    let catalog = StaticIntrospector::new()
        .with_type(
            TypeInfo::class("shop.Note")
                .field("subject", TypeRef::any())
                .field("anything", TypeRef::any()),
        )
        .with_type(TypeInfo::class("shop.Product").field("name", TypeRef::named("String")));
    let manager = manager_with(
        catalog,
        vec![
            ClassDescriptor::class("Note")
                .member(MemberDescriptor::field("subject").implementation("shop.Product")),
            ClassDescriptor::class("Product"),
        ],
    );

    assert_eq!(
        manager.relation_type("shop.Note", "subject").unwrap(),
        RelationKind::OneToOneUni
    );
    // Object members without implementations default to non-persistent
    assert_eq!(
        manager.relation_type("shop.Note", "anything").unwrap(),
        RelationKind::None
    );
}

#[test]
fn test_possibly_persistent_array() {
    let catalog = StaticIntrospector::new().with_type(
        TypeInfo::class("shop.Mailbox")
            .field("attachments", TypeRef::array(TypeRef::any()))
            .field("scraps", TypeRef::array(TypeRef::any())),
    );
    let manager = manager_with(
        catalog,
        vec![ClassDescriptor::class("Mailbox").member(
            MemberDescriptor::field("attachments")
                .container(ContainerDescriptor::array().element_possibly_persistent()),
        )],
    );

    let relation = manager.relation("shop.Mailbox", "attachments").unwrap();
    assert_eq!(relation.kind, RelationKind::OneToManyUni);
    assert!(relation.counterparts.is_empty());

    assert_eq!(
        manager.relation_type("shop.Mailbox", "scraps").unwrap(),
        RelationKind::None
    );
}

#[test]
fn test_relation_is_cached() {
    let manager = order_manager();
    let first = manager.relation("shop.Order", "items").unwrap();

    let items = manager.member_ref("shop.Order", "items").unwrap();
    {
        let model = manager.model();
        let cached = model.member(items).unwrap().cached_relation().cloned();
        assert_eq!(cached, Some(first.clone()));
    }
    assert_eq!(manager.relation("shop.Order", "items").unwrap(), first);
}

#[test]
fn test_relation_kind_helpers() {
    assert!(RelationKind::OneToManyBi.is_bidirectional());
    assert!(!RelationKind::OneToManyUni.is_bidirectional());
    assert!(RelationKind::ManyToOneBi.is_single_valued());
    assert!(RelationKind::ManyToManyBi.is_multi_valued());
    assert!(!RelationKind::None.is_single_valued());
    assert!(!RelationKind::None.is_multi_valued());
    assert_eq!(RelationKind::OneToManyBi.to_string(), "ONE_TO_MANY_BI");
}
