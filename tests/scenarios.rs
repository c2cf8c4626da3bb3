use goaster::{BasicKind, Error, LoadOptions, ObjKind, ObjKinds, Program, Tag, TypKind, TypKinds};

fn one_file(prog: &Program) -> goaster::FileId {
    prog.created_packages().next().expect("one created package").files()[0]
}

#[test]
fn tags_are_added_to_struct_fields() {
    let src = "package m\n\ntype User struct {\n\tName string\n\tAge  int\n\tsecret string\n}\n";
    let mut prog = Program::load_file("user.go", Some(src)).unwrap();
    let user = prog.lookup(ObjKind::Typ, TypKind::Struct, "User")[0].decl_id();

    let mut facade = prog.facade_mut(user);
    assert_eq!(facade.num_fields(), 3);
    let mut name = facade.field_mut_by_name("Name").expect("Name field");
    name.tags_mut()
        .set(Tag::new("json", "name").with_options(["omitempty"]))
        .unwrap();

    let out = prog.format_file(one_file(&prog));
    println!("{out}");
    assert!(out.contains("`json:\"name,omitempty\"`"), "tag literal missing:\n{out}");
    assert_eq!(out.matches("json:").count(), 1, "only Name is tagged");

    let read = prog.facade(user);
    let tag = read.field_by_name("Name").unwrap().tags().get("json").unwrap().clone();
    assert_eq!(tag.name, "name");
    assert!(tag.has_option("omitempty"));
    assert!(read.field_by_name("Age").unwrap().tags().is_empty());
}

#[test]
fn function_bodies_can_be_replaced() {
    let src = "package m\n\n// Greet says hi.\nfunc Greet() string {\n\treturn \"hi\"\n}\n";
    let mut prog = Program::load_file("greet.go", Some(src)).unwrap();
    let greet = prog.lookup(ObjKind::Fun, TypKinds::ANY, "Greet")[0].decl_id();

    prog.facade_mut(greet).cover_body("return \"hello\"").unwrap();

    let out = prog.format_file(one_file(&prog));
    println!("{out}");
    assert!(out.contains("// Greet says hi.\nfunc Greet() string {"), "header and doc kept:\n{out}");
    assert!(out.contains("return \"hello\""), "new body:\n{out}");
    assert!(!out.contains("\"hi\""), "old body gone:\n{out}");
    let body = prog.facade(greet).body().expect("function has a body");
    assert!(body.contains("return \"hello\""), "body accessor sees the edit: {body}");
}

#[test]
fn malformed_body_text_leaves_the_file_alone() {
    let src = "package m\n\nfunc F() int {\n\treturn 1\n}\n";
    let mut prog = Program::load_file("f.go", Some(src)).unwrap();
    let f = prog.lookup(ObjKind::Fun, TypKinds::ANY, "F")[0].decl_id();

    let err = prog.facade_mut(f).cover_body("}\nfunc G() {").unwrap_err();
    println!("{err}");
    assert!(
        matches!(err, Error::StructuralMismatch(_) | Error::Syntax { .. }),
        "unexpected error: {err}"
    );
    assert_eq!(prog.format_file(one_file(&prog)), src);
}

#[test]
fn imports_are_covered_in_place() {
    let src = "package m\n\nimport (\n\t_ \"aaa\"\n\t_ \"errors\"\n\t_ \"bbb\"\n)\n";
    let mut prog = Program::load_file("imports.go", Some(src)).unwrap();
    let file = one_file(&prog);

    prog.file_mut(file).cover_import("\"errors\"", "\"fmt\"", Some("_"));

    let paths: Vec<&str> = prog.file(file).imports().iter().map(|i| i.path.as_str()).collect();
    assert_eq!(paths, vec!["aaa", "fmt", "bbb"], "order is kept");
    let out = prog.format_file(file);
    println!("{out}");
    assert!(out.contains("_ \"fmt\""));
    assert!(!out.contains("errors"));
}

#[test]
fn pointer_receivers_only_count_for_pointers() {
    let src = r#"package m

type Stringer interface {
	String() string
}

type Value struct{}

func (v Value) String() string { return "" }

type Ref struct{}

func (r *Ref) String() string { return "" }

type Other struct{}
"#;
    let prog = Program::load_file("impl.go", Some(src)).unwrap();
    let get = |name: &str| prog.lookup(ObjKind::Typ, TypKinds::ANY, name)[0];
    let (iface, value, reference, other) = (get("Stringer"), get("Value"), get("Ref"), get("Other"));

    assert!(value.implements(&iface, false));
    assert!(value.implements(&iface, true), "pointer method set includes value methods");
    assert!(!reference.implements(&iface, false));
    assert!(reference.implements(&iface, true));
    assert!(!other.implements(&iface, true));
    assert_eq!(value.num_methods(), 1);
    assert_eq!(reference.method(0).name(), "String");
    assert_eq!(iface.iface_num_explicit_methods(), 1);
}

#[test]
fn grouped_fields_get_independent_tags() {
    let src = "package m\n\ntype P struct {\n\tA, B, C int\n}\n";
    let mut prog = Program::load_file("p.go", Some(src)).unwrap();
    let p = prog.lookup(ObjKind::Typ, TypKind::Struct, "P")[0].decl_id();

    let names: Vec<&str> = prog.facade(p).struct_fields().map(|f| f.name()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);

    let mut facade = prog.facade_mut(p);
    facade
        .field_mut_by_name("B")
        .unwrap()
        .tags_mut()
        .set(Tag::new("json", "b"))
        .unwrap();

    let read = prog.facade(p);
    assert!(read.field(0).tags().is_empty());
    assert_eq!(read.field(1).tags().get("json").unwrap().name, "b");
    assert!(read.field(2).tags().is_empty());
    let out = prog.format_file(one_file(&prog));
    println!("{out}");
    assert_eq!(out.matches("json:\"b\"").count(), 1, "only B is tagged:\n{out}");
    assert!(!out.contains("A, B"), "fields print one per line:\n{out}");
}

#[test]
fn formatting_is_idempotent() {
    let src = r#"package m

import "fmt"

// Config holds settings.
type Config struct {
	Name    string `json:"name"`
	Retries int    // how often
}

const (
	Low = iota
	High
)

func (c *Config) String() string {
	return fmt.Sprintf("%s/%d", c.Name, c.Retries)
}
"#;
    let prog = Program::load_file("config.go", Some(src)).unwrap();
    let once = prog.format_file(one_file(&prog));
    assert_eq!(once, src, "gofmt-formatted input is reproduced");

    let again = Program::load_file("config.go", Some(&once)).unwrap();
    assert_eq!(again.format_file(one_file(&again)), once);
}

#[test]
fn docs_can_be_replaced_and_removed() {
    let src = "package m\n\n// Old doc.\nfunc F() {}\n\nvar V = 1\n";
    let mut prog = Program::load_file("doc.go", Some(src)).unwrap();
    let f = prog.lookup(ObjKind::Fun, TypKinds::ANY, "F")[0].decl_id();
    let v = prog.lookup(ObjKind::Var, TypKinds::ANY, "V")[0].decl_id();

    assert_eq!(prog.facade(f).doc(), "Old doc.\n");
    assert!(prog.facade_mut(f).set_doc("New doc."));
    assert!(prog.facade_mut(v).set_doc("V counts."));
    assert_eq!(prog.facade(f).doc(), "New doc.\n");

    let out = prog.format_file(one_file(&prog));
    println!("{out}");
    assert!(out.contains("// New doc.\nfunc F() {}"), "got:\n{out}");
    assert!(out.contains("// V counts.\nvar V = 1"), "got:\n{out}");
    assert!(!out.contains("Old doc."));

    assert!(prog.facade_mut(f).set_doc(""));
    assert_eq!(prog.facade(f).doc(), "");
}

#[test]
fn basic_and_composite_shapes() {
    let src = "package m\n\ntype (\n\tN  int8\n\tA  [4]string\n\tM  map[string]bool\n\tCh <-chan int\n)\n";
    let prog = Program::load_file("shapes.go", Some(src)).unwrap();
    let get = |name: &str| prog.lookup(ObjKinds::ANY, TypKinds::ANY, name)[0];

    assert_eq!(get("N").basic_kind(), BasicKind::Int8);
    assert_eq!(get("A").typ_kind(), TypKind::Array);
    assert_eq!(get("A").len(), 4);
    assert_eq!(get("A").elem().to_string(), "string");
    assert_eq!(get("M").key().to_string(), "string");
    assert_eq!(get("M").elem().to_string(), "bool");
    assert_eq!(get("Ch").typ_kind(), TypKind::Chan);
}

#[test]
#[should_panic(expected = "goaster:")]
fn struct_accessors_panic_on_other_kinds() {
    let prog = Program::load_file("n.go", Some("package m\n\ntype N int\n")).unwrap();
    let n = prog.lookup(ObjKind::Typ, TypKinds::ANY, "N")[0];
    n.num_fields();
}

#[test]
fn locals_are_indexed_only_on_request() {
    let src = "package m\n\nfunc F() {\n\tx := 1\n\t_ = x\n}\n";
    let prog = Program::load_file("f.go", Some(src)).unwrap();
    assert!(prog.lookup(ObjKind::Var, TypKinds::ANY, "x").is_empty());

    let opts = LoadOptions::default().with_local_declarations(true);
    let prog = Program::load_file_with("f.go", Some(src), &opts).unwrap();
    let x = prog.lookup(ObjKind::Var, TypKinds::ANY, "x");
    assert_eq!(x.len(), 1);
    assert!(x[0].is_local());
    assert_eq!(x[0].basic_kind(), BasicKind::Int);
}

#[test]
fn method_bodies_keep_their_one_line_shape() {
    let src = "package m\n\ntype M struct{}\n\nfunc (m *M) S() string { return \"\" }\n";
    let mut prog = Program::load_file("m.go", Some(src)).unwrap();
    let s = prog.lookup(ObjKind::Fun, TypKinds::ANY, "S")[0].decl_id();

    prog.facade_mut(s).cover_body("return \"hello\"").unwrap();

    let out = prog.format_file(one_file(&prog));
    println!("{out}");
    assert_eq!(out, "package m\n\ntype M struct{}\n\nfunc (m *M) S() string { return \"hello\" }\n");
}

#[test]
fn replaced_bodies_are_indented_by_nesting() {
    let src = "package m\n\nfunc Max(a, b int) (int, error) {\n\treturn b, nil\n}\n";
    let mut prog = Program::load_file("max.go", Some(src)).unwrap();
    let max = prog.lookup(ObjKind::Fun, TypKinds::ANY, "Max")[0].decl_id();

    prog.facade_mut(max)
        .cover_body("if a > b {\n// big\nreturn a, nil\n}\n_= a\nreturn b, nil")
        .unwrap();

    let out = prog.format_file(one_file(&prog));
    println!("{out}");
    assert!(
        out.contains("{\n\tif a > b {\n\t\t// big\n\t\treturn a, nil\n\t}\n\t_ = a\n\treturn b, nil\n}\n"),
        "got:\n{out}"
    );
    let again = Program::load_file("max.go", Some(&out)).unwrap();
    assert_eq!(again.format_file(one_file(&again)), out, "replaced body is stable");
}

#[test]
fn methods_bind_across_files() {
    let prog = Program::load_sources([
        ("a.go", "package m\n\ntype T struct{}\n"),
        ("b.go", "package m\n\nfunc (t T) Name() string { return \"t\" }\n\nfunc (t *T) Reset() {}\n"),
    ])
    .unwrap();
    let t = prog.lookup(ObjKind::Typ, TypKinds::ANY, "T")[0];

    let names: Vec<&str> = t.methods().map(|m| m.name()).collect();
    assert_eq!(names, vec!["Name", "Reset"]);
    assert_ne!(t.method(0).file(), t.file(), "methods stay in their own file");
    assert_eq!(prog.file(t.method(1).file()).filename(), "b.go");
}

#[test]
fn tag_edits_through_a_shared_struct_type_accumulate() {
    let src = "package m\n\ntype A struct {\n\tX int\n\tY int\n}\n\ntype B A\n";
    let mut prog = Program::load_file("shared.go", Some(src)).unwrap();
    let a = prog.lookup(ObjKind::Typ, TypKinds::ANY, "A")[0].decl_id();
    let b = prog.lookup(ObjKind::Typ, TypKinds::ANY, "B")[0].decl_id();
    assert_eq!(prog.facade(b).typ_kind(), TypKind::Struct);

    prog.facade_mut(a).field_mut(0).tags_mut().set(Tag::new("json", "x")).unwrap();
    prog.facade_mut(b).field_mut(0).tags_mut().set(Tag::new("xml", "x")).unwrap();

    for id in [a, b] {
        let tags = prog.facade(id).field(0).tags();
        assert_eq!(tags.keys(), vec!["json", "xml"], "both edits are visible from {}", prog.facade(id).name());
    }
    let out = prog.format_file(one_file(&prog));
    println!("{out}");
    assert!(out.contains("X int `json:\"x\" xml:\"x\"`"), "got:\n{out}");
}

#[test]
fn embedded_fields_promote_methods_to_the_outer_type() {
    let src = r#"package m

type Stringer interface {
	String() string
}

type Base struct{}

func (Base) String() string { return "" }

type Ref struct{}

func (*Ref) String() string { return "" }

type Wrapper struct {
	Base
}

type ByRef struct {
	*Ref
}

type ByValue struct {
	Ref
}
"#;
    let prog = Program::load_file("embed.go", Some(src)).unwrap();
    let get = |name: &str| prog.lookup(ObjKind::Typ, TypKinds::ANY, name)[0];
    let iface = get("Stringer");

    assert!(get("Wrapper").implements(&iface, false));
    assert!(get("Wrapper").implements(&iface, true));
    assert!(get("ByRef").implements(&iface, false), "embedded pointer brings pointer methods");
    assert!(!get("ByValue").implements(&iface, false));
    assert!(get("ByValue").implements(&iface, true), "addressable embedded value");
    assert_eq!(get("Wrapper").num_methods(), 0, "promoted methods are not declared methods");
}

#[test]
fn values_of_named_types_list_the_type_methods() {
    let src = "package m\n\ntype T int\n\nfunc (T) M() {}\n\nvar v T\n\nvar n int\n";
    let prog = Program::load_file("v.go", Some(src)).unwrap();
    let v = prog.lookup(ObjKind::Var, TypKinds::ANY, "v")[0];
    let n = prog.lookup(ObjKind::Var, TypKinds::ANY, "n")[0];

    assert_eq!(v.num_methods(), 1);
    assert_eq!(v.method(0).name(), "M");
    assert_eq!(n.methods().count(), 0);
}

#[test]
fn unloaded_dot_imports_keep_the_package() {
    let src = "package m\n\nimport . \"strings\"\n\nvar b Builder\n";
    let prog = Program::load_file("dot.go", Some(src)).unwrap();
    let pkg = prog.created_packages().next().unwrap();
    println!("{:?}", pkg.errors());
    assert!(pkg.errors().iter().all(|e| e.soft));
    assert!(pkg.errors().iter().any(|e| e.msg == "undeclared name: Builder"));
    assert_eq!(prog.lookup(ObjKind::Var, TypKinds::ANY, "b").len(), 1);
}

#[test]
fn import_aliases_follow_import_edits() {
    let src = "package m\n\nimport (\n\tstr \"strings\"\n\t\"fmt\"\n\tos2 \"os\"\n)\n";
    let mut prog = Program::load_file("alias.go", Some(src)).unwrap();
    let file = one_file(&prog);
    let aliases = |prog: &Program| -> Vec<String> {
        prog.lookup(ObjKind::Pkg, TypKinds::ANY, "")
            .iter()
            .map(|f| f.name().to_string())
            .collect()
    };
    assert_eq!(aliases(&prog), vec!["str", "os2"]);

    prog.cover_import(file, "strings", "bytes", Some("b"));
    prog.cover_import(file, "fmt", "fmt", Some("f"));
    prog.del_import(file, "os");

    assert_eq!(aliases(&prog), vec!["b", "f"]);
    assert!(prog.lookup(ObjKind::Pkg, TypKinds::ANY, "str").is_empty());
    let out = prog.format_file(file);
    println!("{out}");
    assert!(out.contains("b \"bytes\""), "got:\n{out}");
    assert!(!out.contains("os"), "got:\n{out}");
}

mod module {
    use super::*;
    use std::fs;

    fn write_module(root: &std::path::Path) {
        fs::write(root.join("go.mod"), "module example.com/m\n\ngo 1.21\n").unwrap();
        fs::create_dir_all(root.join("app")).unwrap();
        fs::create_dir_all(root.join("model")).unwrap();
        fs::write(
            root.join("model/model.go"),
            "package model\n\n// Item is stored.\ntype Item struct {\n\tID   int\n\tName string\n}\n",
        )
        .unwrap();
        fs::write(
            root.join("app/app.go"),
            "package app\n\nimport \"example.com/m/model\"\n\nvar Current model.Item\n\ntype Box struct {\n\tItem model.Item\n}\n",
        )
        .unwrap();
        fs::write(root.join("app/app_test.go"), "package app\n\nvar testOnly = 1\n").unwrap();
    }

    #[test]
    fn module_packages_load_with_their_imports() {
        let dir = tempfile::tempdir().unwrap();
        write_module(dir.path());

        let prog = Program::load_packages([dir.path().join("app")]).unwrap();
        let created: Vec<&str> = prog.created_packages().map(|p| p.path()).collect();
        let imported: Vec<&str> = prog.imported_packages().map(|p| p.path()).collect();
        assert_eq!(created, vec!["example.com/m/app"]);
        assert_eq!(imported, vec!["example.com/m/model"]);

        let current = prog.lookup(ObjKind::Var, TypKinds::ANY, "Current")[0];
        assert_eq!(current.typ_kind(), TypKind::Struct, "imported type resolves to its struct");
        assert!(
            prog.lookup(ObjKind::Var, TypKinds::ANY, "testOnly").is_empty(),
            "test files are skipped by default"
        );

        let app_file = current.file();
        let item = prog.lookup_type_facade(app_file, "model.Item").expect("qualified lookup");
        assert_eq!(item.doc(), "Item is stored.\n");
        assert_eq!(item.num_fields(), 2);
    }

    #[test]
    fn rewrite_touches_only_changed_files() {
        let dir = tempfile::tempdir().unwrap();
        write_module(dir.path());

        let mut prog = Program::load_packages([dir.path().join("app")]).unwrap();
        assert_eq!(prog.rewrite().unwrap(), 0, "nothing changed yet");

        let item = prog.lookup(ObjKind::Typ, TypKind::Struct, "Item")[0].decl_id();
        prog.facade_mut(item)
            .field_mut_by_name("Name")
            .unwrap()
            .tags_mut()
            .set(Tag::new("json", "name"))
            .unwrap();
        assert_eq!(prog.rewrite().unwrap(), 1);

        let text = fs::read_to_string(dir.path().join("model/model.go")).unwrap();
        println!("{text}");
        assert!(text.contains("`json:\"name\"`"), "got:\n{text}");
        let reloaded = Program::load_packages([dir.path().join("model")]).unwrap();
        let fields: Vec<String> = reloaded.lookup(ObjKind::Typ, TypKind::Struct, "Item")[0]
            .struct_fields()
            .filter_map(|f| f.tags().get("json").ok().map(|t| t.name.clone()))
            .collect();
        assert_eq!(fields, vec!["name"]);
    }

    #[test]
    fn missing_go_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        let err = Program::load_packages([dir.path().join("empty")]).unwrap_err();
        assert!(matches!(err, Error::NoGoFiles(_)), "got {err}");
    }
}
