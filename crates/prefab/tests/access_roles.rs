use graft_classfile::{AccessFlags, ClassFile, ConstantPool, Member};
use graft_core::{
    ClassDescriptor, FieldDescriptor, MethodDescriptor, PrimitiveType, TransformerData,
};
use graft_plugin::Transformer;
use graft_prefab::{Access, PrefabTransformer, TargetDescriptor};

fn class(name: &str) -> ClassDescriptor {
    ClassDescriptor::of(name).unwrap()
}

fn int() -> ClassDescriptor {
    ClassDescriptor::from_primitive(PrimitiveType::Int)
}

/// `Engine` owns the private field `ticks` and hosts a native accessor for `Clock.now()`.
fn engine_class() -> ClassFile {
    let mut pool = ConstantPool::new();
    let this_class = pool.add_class("com/example/Engine").unwrap();
    let super_class = pool.add_class("java/lang/Object").unwrap();
    let ticks = pool.add_utf8("ticks").unwrap();
    let int_descriptor = pool.add_utf8("I").unwrap();

    let mut file = ClassFile {
        minor_version: 0,
        major_version: 61,
        constant_pool: pool,
        access: AccessFlags::PUBLIC | AccessFlags::SUPER,
        this_class,
        super_class,
        interfaces: Vec::new(),
        fields: vec![Member {
            access: AccessFlags::PRIVATE,
            name_index: ticks,
            descriptor_index: int_descriptor,
            attributes: Vec::new(),
        }],
        methods: Vec::new(),
        attributes: Vec::new(),
    };
    file.add_method(
        AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::NATIVE,
        "clockNow",
        "(Lcom/example/Clock;)I",
    )
    .unwrap();
    ClassFile::parse(&file.to_bytes()).unwrap()
}

fn transformer() -> PrefabTransformer<Access> {
    let engine = class("com.example.Engine");
    let clock = class("com.example.Clock");

    let field = TargetDescriptor::field(
        engine.clone(),
        FieldDescriptor::new("ticks", int(), false).unwrap(),
        class("com.example.Hooks"),
        MethodDescriptor::new("ticks", vec![engine.clone()], int(), true).unwrap(),
    )
    .unwrap();
    let method = TargetDescriptor::method(
        clock.clone(),
        MethodDescriptor::new("now", vec![], int(), false).unwrap(),
        engine,
        MethodDescriptor::new("clockNow", vec![clock], int(), true).unwrap(),
    )
    .unwrap();

    PrefabTransformer::new(
        TransformerData::builder("demo", "engine-access").build().unwrap(),
        Access::new([field, method]),
    )
}

#[test]
fn test_targets_cover_every_role() {
    let names: Vec<String> = transformer()
        .targets()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    assert_eq!(
        names,
        vec!["com.example.Engine", "com.example.Hooks", "com.example.Clock"]
    );
}

#[test]
fn test_class_with_both_roles_gets_both_edits() {
    let mut file = engine_class();
    transformer().transform(&mut file).unwrap();

    let reparsed = ClassFile::parse(&file.to_bytes()).unwrap();

    let field = reparsed.find_field("ticks", "I").unwrap();
    assert_eq!(reparsed.fields[field].access, AccessFlags::PUBLIC);

    let accessor = reparsed.find_method("clockNow", "(Lcom/example/Clock;)I").unwrap();
    assert!(!reparsed.methods[accessor].access.contains(AccessFlags::NATIVE));
    let body = reparsed.code(accessor).unwrap().unwrap();
    assert_eq!(body.instructions.len(), 3);
}

#[test]
fn test_unrelated_class_is_left_alone() {
    let mut pool = ConstantPool::new();
    let this_class = pool.add_class("com/example/Unrelated").unwrap();
    let super_class = pool.add_class("java/lang/Object").unwrap();
    let original = ClassFile {
        minor_version: 0,
        major_version: 61,
        constant_pool: pool,
        access: AccessFlags::PUBLIC,
        this_class,
        super_class,
        interfaces: Vec::new(),
        fields: Vec::new(),
        methods: Vec::new(),
        attributes: Vec::new(),
    };

    let mut file = original.clone();
    transformer().transform(&mut file).unwrap();
    assert_eq!(file.to_bytes(), original.to_bytes());
}
