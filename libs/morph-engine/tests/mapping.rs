use std::cell::RefCell;
use std::rc::Rc;

use morph_api::error::MapError;
use morph_api::tabular::RowCursor;
use morph_api::value::{Value, ValueKind};
use morph_api::PropertyBag;
use morph_derive::Reflect;
use morph_engine::{CollectionMapMode, Engine};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

#[derive(Reflect, Default, Clone)]
struct Person {
    name: String,
    age: i32,
    nickname: Option<String>,
}

#[allow(non_snake_case)]
#[derive(Reflect, Default)]
struct PersonRecord {
    Name: String,
    AGE: i64,
}

#[derive(Reflect, Default, Clone, Debug, PartialEq)]
struct Item {
    id: i32,
}

#[derive(Reflect, Default, Clone)]
struct ItemView {
    id: i64,
}

#[derive(Reflect, Default)]
struct Order {
    #[reflect(objects)]
    lines: Vec<Item>,
}

#[derive(Reflect, Default)]
struct OrderView {
    #[reflect(objects)]
    lines: Vec<ItemView>,
}

#[derive(Reflect, Default)]
struct Node {
    id: i32,
    #[reflect(shared)]
    next: Option<Rc<RefCell<Node>>>,
}

fn node(id: i32) -> Rc<RefCell<Node>> {
    Rc::new(RefCell::new(Node { id, next: None }))
}

/// Linked chain of `n` nodes with ids `base..base + n`.
fn chain(n: i32, base: i32) -> Rc<RefCell<Node>> {
    let head = node(base);
    let mut cur = Rc::clone(&head);
    for i in 1..n {
        let next = node(base + i);
        cur.borrow_mut().next = Some(Rc::clone(&next));
        cur = next;
    }
    head
}

// ---------------------------------------------------------------------------
// Name matching and scalar conversion
// ---------------------------------------------------------------------------

#[test]
fn matches_properties_by_name_ignoring_case() {
    let engine = Engine::new();
    let source = PersonRecord {
        Name: "Ada".into(),
        AGE: 36,
    };
    let mut target = Person::default();

    engine.map(&source, &mut target).unwrap();
    assert_eq!(target.name, "Ada");
    assert_eq!(target.age, 36);
}

#[test]
fn converts_text_to_number_through_the_builtin_tier() {
    #[derive(Reflect, Default)]
    struct Form {
        age: String,
    }

    let engine = Engine::new();
    let mut target = Person::default();
    engine.map(&Form { age: "42".into() }, &mut target).unwrap();
    assert_eq!(target.age, 42);

    // unparsable input is a silent miss
    let mut untouched = Person { age: 7, ..Person::default() };
    engine
        .map(&Form { age: "not a number".into() }, &mut untouched)
        .unwrap();
    assert_eq!(untouched.age, 7);
}

#[test]
fn maps_enums_by_variant_name() {
    #[derive(Reflect, Default, Clone, Copy, Debug, PartialEq)]
    enum Color {
        #[default]
        Red,
        Green,
    }

    #[derive(Reflect, Default)]
    struct Paint {
        #[reflect(enumeration)]
        color: Color,
    }

    #[derive(Reflect, Default)]
    struct PaintForm {
        color: String,
    }

    let engine = Engine::new();

    let mut form = PaintForm::default();
    engine.map(&Paint { color: Color::Green }, &mut form).unwrap();
    assert_eq!(form.color, "Green");

    let mut paint = Paint::default();
    engine.map(&PaintForm { color: "green".into() }, &mut paint).unwrap();
    assert_eq!(paint.color, Color::Green);
}

// ---------------------------------------------------------------------------
// Null propagation
// ---------------------------------------------------------------------------

#[test]
fn absent_source_clears_an_optional_target() {
    #[derive(Reflect, Default)]
    struct Draft {
        nickname: Option<String>,
    }

    let engine = Engine::new();
    let mut target = Person {
        nickname: Some("old".into()),
        ..Person::default()
    };
    engine.map(&Draft { nickname: None }, &mut target).unwrap();
    assert_eq!(target.nickname, None);
}

#[test]
fn absent_source_leaves_a_non_optional_target_untouched() {
    #[derive(Reflect, Default)]
    struct Draft {
        name: Option<String>,
    }

    let engine = Engine::new();
    let mut target = Person {
        name: "keep".into(),
        ..Person::default()
    };
    engine.map(&Draft { name: None }, &mut target).unwrap();
    assert_eq!(target.name, "keep");
}

#[test]
fn map_or_null_passes_none_through() {
    let engine = Engine::new();
    let out = engine.map_or_null(None, Person::default).unwrap();
    assert!(out.is_none());

    let source = PersonRecord {
        Name: "Ada".into(),
        AGE: 36,
    };
    let out = engine
        .map_or_null(Some(&source), Person::default)
        .unwrap()
        .unwrap();
    assert_eq!(out.name, "Ada");
}

// ---------------------------------------------------------------------------
// Nested objects and cycles
// ---------------------------------------------------------------------------

#[test]
fn recurses_into_nested_objects() {
    #[derive(Reflect, Default)]
    struct Inner {
        qty: i32,
    }

    #[derive(Reflect, Default)]
    struct Outer {
        title: String,
        #[reflect(object)]
        inner: Inner,
    }

    #[derive(Reflect, Default)]
    struct InnerView {
        qty: String,
    }

    #[derive(Reflect, Default)]
    struct OuterView {
        title: String,
        #[reflect(object)]
        inner: InnerView,
    }

    let engine = Engine::new();
    let source = Outer {
        title: "box".into(),
        inner: Inner { qty: 12 },
    };
    let mut target = OuterView::default();
    engine.map(&source, &mut target).unwrap();
    assert_eq!(target.title, "box");
    assert_eq!(target.inner.qty, "12");
}

#[test]
fn cyclic_graphs_terminate() {
    let a = node(1);
    let b = node(2);
    a.borrow_mut().next = Some(Rc::clone(&b));
    b.borrow_mut().next = Some(Rc::clone(&a));

    let x = node(0);
    let y = node(0);
    x.borrow_mut().next = Some(Rc::clone(&y));
    y.borrow_mut().next = Some(Rc::clone(&x));

    let engine = Engine::new();
    engine.map(&*a.borrow(), &mut *x.borrow_mut()).unwrap();

    assert_eq!(x.borrow().id, 1);
    assert_eq!(y.borrow().id, 2);
}

#[test]
fn deep_distinct_chains_hit_the_recursion_limit() {
    let source = chain(10, 1);
    let target = chain(10, 0);

    let mut engine = Engine::new();
    engine.set_max_depth(4);
    let err = engine
        .map(&*source.borrow(), &mut *target.borrow_mut())
        .unwrap_err();
    assert!(matches!(err, MapError::RecursionLimit { max: 4 }));

    // within the limit the whole chain is mapped
    engine.set_max_depth(100);
    let target = chain(10, 0);
    engine
        .map(&*source.borrow(), &mut *target.borrow_mut())
        .unwrap();
    let mut cur = Some(Rc::clone(&target));
    let mut expected = 1;
    while let Some(n) = cur {
        assert_eq!(n.borrow().id, expected);
        expected += 1;
        cur = n.borrow().next.clone();
    }
    assert_eq!(expected, 11);
}

#[test]
fn borrow_conflicts_on_shared_handles_surface_as_plan_faults() {
    // chain 1 -> 2 -> 3 against a two-node target cycle: node 3 reaches the
    // top-level target again under a fresh identity pair while the caller
    // still holds its mutable borrow
    let source = chain(3, 1);
    let x = node(0);
    let y = node(0);
    x.borrow_mut().next = Some(Rc::clone(&y));
    y.borrow_mut().next = Some(Rc::clone(&x));

    let engine = Engine::new();
    let err = engine
        .map(&*source.borrow(), &mut *x.borrow_mut())
        .unwrap_err();
    assert!(matches!(
        err,
        MapError::PlanFault {
            source_type: "Node",
            target_type: "Node",
            ..
        }
    ));
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

#[test]
fn construct_mode_builds_and_maps_fresh_elements() {
    let engine = Engine::new();
    let source = Order {
        lines: vec![Item { id: 1 }, Item { id: 2 }],
    };
    let mut target = OrderView::default();
    engine.map(&source, &mut target).unwrap();
    let ids: Vec<i64> = target.lines.iter().map(|l| l.id).collect();
    assert_eq!(ids, [1, 2]);
}

#[test]
fn reference_copy_is_additive() {
    let engine = Engine::new();
    let source = vec![Item { id: 1 }, Item { id: 2 }, Item { id: 3 }];
    let mut target = vec![Item { id: 0 }];
    engine.map_collection_refs(&source, &mut target).unwrap();
    let ids: Vec<i32> = target.iter().map(|i| i.id).collect();
    assert_eq!(ids, [0, 1, 2, 3]);
}

#[test]
fn reference_mode_applies_to_matching_collection_properties() {
    let mut engine = Engine::new();
    engine.set_collection_map_mode(CollectionMapMode::Reference);

    let source = Order {
        lines: vec![Item { id: 5 }],
    };
    let mut target = Order {
        lines: vec![Item { id: 9 }],
    };
    engine.map(&source, &mut target).unwrap();
    assert_eq!(target.lines, [Item { id: 9 }, Item { id: 5 }]);
}

#[test]
fn collection_mapping_with_an_explicit_factory() {
    let engine = Engine::new();
    let source = vec![Item { id: 4 }];
    let mut target: Vec<ItemView> = Vec::new();
    engine
        .map_collection_with(&source, &mut target, ItemView::default)
        .unwrap();
    assert_eq!(target.len(), 1);
    assert_eq!(target[0].id, 4);
}

// ---------------------------------------------------------------------------
// Keyed objects
// ---------------------------------------------------------------------------

#[test]
fn keyed_source_feeds_named_target_properties() {
    let engine = Engine::new();
    let mut bag = PropertyBag::new();
    bag.insert("Name", "Grace");
    bag.insert("Age", 45i64);

    let mut person = Person::default();
    engine.map(&bag, &mut person).unwrap();
    assert_eq!(person.name, "Grace");
    assert_eq!(person.age, 45);
}

#[test]
fn object_source_lands_in_a_keyed_target_under_property_names() {
    let engine = Engine::new();
    let person = Person {
        name: "Grace".into(),
        age: 45,
        nickname: None,
    };

    let mut bag = PropertyBag::new();
    engine.map(&person, &mut bag).unwrap();
    assert_eq!(bag.get("name"), Some(&Value::Str("Grace".into())));
    assert_eq!(bag.get("age"), Some(&Value::I32(45)));
    assert_eq!(bag.get("nickname"), Some(&Value::Null));
}

#[test]
fn nested_map_value_fills_a_nested_object_target() {
    #[derive(Reflect, Default)]
    struct Address {
        city: String,
    }

    #[derive(Reflect, Default)]
    struct Customer {
        name: String,
        #[reflect(object)]
        address: Address,
    }

    let engine = Engine::new();
    let mut bag = PropertyBag::new();
    bag.insert("name", "Ada");
    bag.insert(
        "address",
        Value::Map(vec![("city".into(), Value::Str("Oslo".into()))]),
    );

    let mut customer = Customer::default();
    engine.map(&bag, &mut customer).unwrap();
    assert_eq!(customer.name, "Ada");
    assert_eq!(customer.address.city, "Oslo");
}

#[test]
fn maps_a_tabular_row_through_a_bag() {
    struct OneRow;

    impl RowCursor for OneRow {
        fn columns(&self) -> Vec<String> {
            vec!["name".into(), "age".into()]
        }

        fn advance(&mut self) -> bool {
            false
        }

        fn get(&self, column: &str) -> Value {
            match column {
                "name" => Value::Str("Lin".into()),
                "age" => Value::Str("28".into()),
                _ => Value::Null,
            }
        }
    }

    let engine = Engine::new();
    let mut person = Person::default();
    engine.map_row(&OneRow, &mut person).unwrap();
    assert_eq!(person.name, "Lin");
    assert_eq!(person.age, 28);
}

// ---------------------------------------------------------------------------
// Custom converters
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Money {
    cents: i64,
}

#[derive(Reflect, Default)]
struct Quote {
    price: String,
}

#[derive(Reflect, Default)]
struct PricedQuote {
    #[reflect(opaque)]
    price: Money,
}

fn money_engine() -> Engine {
    let mut engine = Engine::new();
    engine.add_converter::<Money, _>(|v| match v {
        Value::Str(s) => {
            let d = morph_api::Decimal::parse(s)?;
            Some(Money {
                cents: i64::try_from(d.unscaled).ok()? * 10i64.pow(2u32.saturating_sub(d.scale as u32)),
            })
        }
        _ => None,
    });
    engine
}

#[test]
fn custom_converter_fills_an_opaque_target() {
    let engine = money_engine();
    let mut target = PricedQuote::default();
    engine
        .map(&Quote { price: "12.50".into() }, &mut target)
        .unwrap();
    assert_eq!(target.price, Money { cents: 1250 });
}

#[test]
fn kind_converter_runs_after_the_builtin_tier_declines() {
    #[derive(Reflect, Default)]
    struct Form {
        age: String,
    }

    let mut engine = Engine::new();
    engine.add_converter_for(ValueKind::I32, |v| match v {
        Value::Str(s) => s.strip_prefix('#')?.parse::<i32>().ok().map(Value::I32),
        _ => None,
    });

    let mut person = Person::default();
    engine.map(&Form { age: "#7".into() }, &mut person).unwrap();
    assert_eq!(person.age, 7);

    // plain digits are handled by the built-in tier and never reach the
    // custom converter
    engine.map(&Form { age: "9".into() }, &mut person).unwrap();
    assert_eq!(person.age, 9);
}

#[test]
fn convert_invokes_the_registered_converter_directly() {
    let engine = money_engine();
    let money: Money = engine.convert(&Value::Str("3.99".into())).unwrap();
    assert_eq!(money, Money { cents: 399 });
    assert_eq!(engine.convert::<Money>(&Value::Bool(true)), None);
}

// ---------------------------------------------------------------------------
// Post actions and plan edits
// ---------------------------------------------------------------------------

#[test]
fn post_action_runs_after_the_plan() {
    let mut engine = Engine::new();
    engine.add_post_action::<PersonRecord, Person, _>(|_, t| {
        t.nickname = Some(format!("{}!", t.name));
    });

    let source = PersonRecord {
        Name: "Ada".into(),
        AGE: 36,
    };
    let mut target = Person::default();
    engine.map(&source, &mut target).unwrap();
    assert_eq!(target.nickname.as_deref(), Some("Ada!"));
}

#[test]
fn remove_property_map_excludes_a_property_for_one_pair() {
    let mut engine = Engine::new();
    engine.remove_property_map::<Person, Person, _>(|t| t.name == "name");

    let source = Person {
        name: "new".into(),
        age: 50,
        nickname: None,
    };
    let mut target = Person {
        name: "original".into(),
        ..Person::default()
    };
    engine.map(&source, &mut target).unwrap();
    assert_eq!(target.name, "original");
    assert_eq!(target.age, 50);
}

#[test]
fn remove_property_map_then_replaces_the_default_with_a_post_action() {
    let mut engine = Engine::new();
    engine.remove_property_map_then::<Person, Person, _, _>(
        |t| t.name == "age",
        |s: &Person, t: &mut Person| t.age = s.age * 2,
    );

    let source = Person {
        age: 21,
        ..Person::default()
    };
    let mut target = Person::default();
    engine.map(&source, &mut target).unwrap();
    assert_eq!(target.age, 42);
}
