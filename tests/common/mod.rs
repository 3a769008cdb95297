#![allow(dead_code)]

use apisurface::core::{Archive, MemoryArchive};
use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_BRIDGE: u16 = 0x0040;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_SYNTHETIC: u16 = 0x1000;

#[derive(Default)]
struct PoolWriter {
    bytes: Vec<u8>,
    count: u16,
    utf8: HashMap<String, u16>,
    classes: HashMap<String, u16>,
}

impl PoolWriter {
    fn new() -> Self {
        Self {
            count: 1,
            ..Self::default()
        }
    }

    fn utf8(&mut self, value: &str) -> u16 {
        if let Some(&index) = self.utf8.get(value) {
            return index;
        }
        let index = self.count;
        self.bytes.push(1);
        self.bytes.extend((value.len() as u16).to_be_bytes());
        self.bytes.extend(value.as_bytes());
        self.count += 1;
        self.utf8.insert(value.to_string(), index);
        index
    }

    fn class(&mut self, internal_name: &str) -> u16 {
        if let Some(&index) = self.classes.get(internal_name) {
            return index;
        }
        let name_index = self.utf8(internal_name);
        let index = self.count;
        self.bytes.push(7);
        self.bytes.extend(name_index.to_be_bytes());
        self.count += 1;
        self.classes.insert(internal_name.to_string(), index);
        index
    }

    fn integer(&mut self, value: i32) -> u16 {
        let index = self.count;
        self.bytes.push(3);
        self.bytes.extend(value.to_be_bytes());
        self.count += 1;
        index
    }

    fn long(&mut self, value: i64) -> u16 {
        let index = self.count;
        self.bytes.push(5);
        self.bytes.extend(value.to_be_bytes());
        self.count += 2;
        index
    }
}

/// A field or method to emit.
#[derive(Debug, Clone)]
pub struct MemberSpec {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    pub exceptions: Vec<String>,
    pub annotations: Vec<String>,
    pub invisible_annotations: Vec<String>,
    pub parameter_annotations: Vec<Vec<String>>,
    pub with_code: bool,
}

impl MemberSpec {
    pub fn new(access: u16, name: &str, descriptor: &str) -> Self {
        Self {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            exceptions: Vec::new(),
            annotations: Vec::new(),
            invisible_annotations: Vec::new(),
            parameter_annotations: Vec::new(),
            with_code: false,
        }
    }

    pub fn throws(mut self, exception: &str) -> Self {
        self.exceptions.push(exception.to_string());
        self
    }

    pub fn annotated(mut self, annotation: &str) -> Self {
        self.annotations.push(annotation.to_string());
        self
    }

    pub fn invisibly_annotated(mut self, annotation: &str) -> Self {
        self.invisible_annotations.push(annotation.to_string());
        self
    }

    pub fn parameter_annotated(mut self, position: usize, annotation: &str) -> Self {
        if self.parameter_annotations.len() <= position {
            self.parameter_annotations.resize_with(position + 1, Vec::new);
        }
        self.parameter_annotations[position].push(annotation.to_string());
        self
    }

    pub fn with_code(mut self) -> Self {
        self.with_code = true;
        self
    }
}

/// Writes structurally valid class files. Names are internal (`com/acme/Foo`).
#[derive(Debug, Clone)]
pub struct ClassFileBuilder {
    access: u16,
    this_class: String,
    super_class: Option<String>,
    interfaces: Vec<String>,
    fields: Vec<MemberSpec>,
    methods: Vec<MemberSpec>,
    annotations: Vec<String>,
    inner_classes: Vec<(String, Option<String>, Option<String>, u16)>,
    enclosing_class: Option<String>,
    long_constant: bool,
}

impl ClassFileBuilder {
    pub fn new(internal_name: &str) -> Self {
        Self {
            access: ACC_PUBLIC | ACC_SUPER,
            this_class: internal_name.to_string(),
            super_class: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            annotations: Vec::new(),
            inner_classes: Vec::new(),
            enclosing_class: None,
            long_constant: false,
        }
    }

    pub fn access(mut self, access: u16) -> Self {
        self.access = access;
        self
    }

    pub fn extends(mut self, super_class: &str) -> Self {
        self.super_class = Some(super_class.to_string());
        self
    }

    pub fn no_super(mut self) -> Self {
        self.super_class = None;
        self
    }

    pub fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.to_string());
        self
    }

    pub fn field(self, access: u16, name: &str, descriptor: &str) -> Self {
        self.field_spec(MemberSpec::new(access, name, descriptor))
    }

    pub fn field_spec(mut self, spec: MemberSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn method(self, access: u16, name: &str, descriptor: &str) -> Self {
        self.method_spec(MemberSpec::new(access, name, descriptor).with_code())
    }

    pub fn method_spec(mut self, spec: MemberSpec) -> Self {
        self.methods.push(spec);
        self
    }

    pub fn annotated(mut self, annotation: &str) -> Self {
        self.annotations.push(annotation.to_string());
        self
    }

    /// Adds an `InnerClasses` row.
    pub fn inner_class(
        mut self,
        inner: &str,
        outer: Option<&str>,
        simple_name: Option<&str>,
        access: u16,
    ) -> Self {
        self.inner_classes.push((
            inner.to_string(),
            outer.map(str::to_string),
            simple_name.map(str::to_string),
            access,
        ));
        self
    }

    pub fn enclosing_method(mut self, class: &str) -> Self {
        self.enclosing_class = Some(class.to_string());
        self
    }

    /// Puts a long constant (two pool slots) in front of everything else.
    pub fn with_long_constant(mut self) -> Self {
        self.long_constant = true;
        self
    }

    pub fn entry_name(&self) -> String {
        format!("{}.class", self.this_class)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut pool = PoolWriter::new();
        if self.long_constant {
            pool.long(0x1234_5678_9abc_def0);
        }

        let mut body = Vec::new();
        put_u2(&mut body, self.access);
        put_u2(&mut body, pool.class(&self.this_class));
        match &self.super_class {
            Some(name) => put_u2(&mut body, pool.class(name)),
            None => put_u2(&mut body, 0),
        }
        put_u2(&mut body, self.interfaces.len() as u16);
        for interface in &self.interfaces {
            put_u2(&mut body, pool.class(interface));
        }

        put_u2(&mut body, self.fields.len() as u16);
        for field in &self.fields {
            write_member(&mut body, &mut pool, field);
        }
        put_u2(&mut body, self.methods.len() as u16);
        for method in &self.methods {
            write_member(&mut body, &mut pool, method);
        }

        let mut attributes: Vec<(u16, Vec<u8>)> = Vec::new();
        attributes.push((pool.utf8("SourceFile"), pool.utf8("Generated.java").to_be_bytes().to_vec()));
        if !self.annotations.is_empty() {
            attributes.push((
                pool.utf8("RuntimeVisibleAnnotations"),
                annotations_attribute(&mut pool, &self.annotations),
            ));
        }
        if !self.inner_classes.is_empty() {
            let mut data = Vec::new();
            put_u2(&mut data, self.inner_classes.len() as u16);
            for (inner, outer, simple_name, access) in &self.inner_classes {
                put_u2(&mut data, pool.class(inner));
                put_u2(&mut data, outer.as_deref().map_or(0, |o| pool.class(o)));
                put_u2(&mut data, simple_name.as_deref().map_or(0, |n| pool.utf8(n)));
                put_u2(&mut data, *access);
            }
            attributes.push((pool.utf8("InnerClasses"), data));
        }
        if let Some(enclosing) = &self.enclosing_class {
            let mut data = Vec::new();
            put_u2(&mut data, pool.class(enclosing));
            put_u2(&mut data, 0);
            attributes.push((pool.utf8("EnclosingMethod"), data));
        }
        write_attributes(&mut body, &attributes);

        let mut out = Vec::new();
        out.extend(0xCAFEBABEu32.to_be_bytes());
        put_u2(&mut out, 0);
        put_u2(&mut out, 52);
        put_u2(&mut out, pool.count);
        out.extend(&pool.bytes);
        out.extend(body);
        out
    }
}

fn put_u2(out: &mut Vec<u8>, value: u16) {
    out.extend(value.to_be_bytes());
}

fn write_attributes(out: &mut Vec<u8>, attributes: &[(u16, Vec<u8>)]) {
    put_u2(out, attributes.len() as u16);
    for (name, data) in attributes {
        put_u2(out, *name);
        out.extend((data.len() as u32).to_be_bytes());
        out.extend(data);
    }
}

fn write_member(out: &mut Vec<u8>, pool: &mut PoolWriter, member: &MemberSpec) {
    put_u2(out, member.access);
    put_u2(out, pool.utf8(&member.name));
    put_u2(out, pool.utf8(&member.descriptor));

    let mut attributes: Vec<(u16, Vec<u8>)> = Vec::new();
    if member.with_code {
        // max_stack, max_locals, code { return }, no handlers, no attributes
        let code = vec![0, 1, 0, 1, 0, 0, 0, 1, 0xb1, 0, 0, 0, 0];
        attributes.push((pool.utf8("Code"), code));
    }
    if !member.exceptions.is_empty() {
        let mut data = Vec::new();
        put_u2(&mut data, member.exceptions.len() as u16);
        for exception in &member.exceptions {
            put_u2(&mut data, pool.class(exception));
        }
        attributes.push((pool.utf8("Exceptions"), data));
    }
    if !member.annotations.is_empty() {
        attributes.push((
            pool.utf8("RuntimeVisibleAnnotations"),
            annotations_attribute(pool, &member.annotations),
        ));
    }
    if !member.invisible_annotations.is_empty() {
        attributes.push((
            pool.utf8("RuntimeInvisibleAnnotations"),
            annotations_attribute(pool, &member.invisible_annotations),
        ));
    }
    if !member.parameter_annotations.is_empty() {
        let mut data = vec![member.parameter_annotations.len() as u8];
        for annotations in &member.parameter_annotations {
            put_u2(&mut data, annotations.len() as u16);
            for annotation in annotations {
                write_annotation(&mut data, pool, annotation);
            }
        }
        attributes.push((pool.utf8("RuntimeVisibleParameterAnnotations"), data));
    }
    write_attributes(out, &attributes);
}

fn annotations_attribute(pool: &mut PoolWriter, annotations: &[String]) -> Vec<u8> {
    let mut data = Vec::new();
    put_u2(&mut data, annotations.len() as u16);
    for annotation in annotations {
        write_annotation(&mut data, pool, annotation);
    }
    data
}

/// Each annotation carries an int, an enum, a string array and a nested
/// annotation so element value skipping is exercised.
fn write_annotation(out: &mut Vec<u8>, pool: &mut PoolWriter, annotation: &str) {
    put_u2(out, pool.utf8(&format!("L{};", annotation)));
    put_u2(out, 4);

    put_u2(out, pool.utf8("value"));
    out.push(b'I');
    put_u2(out, pool.integer(42));

    put_u2(out, pool.utf8("mode"));
    out.push(b'e');
    put_u2(out, pool.utf8("Lcom/acme/Mode;"));
    put_u2(out, pool.utf8("FAST"));

    put_u2(out, pool.utf8("names"));
    out.push(b'[');
    put_u2(out, 2);
    out.push(b's');
    put_u2(out, pool.utf8("first"));
    out.push(b's');
    put_u2(out, pool.utf8("second"));

    put_u2(out, pool.utf8("nested"));
    out.push(b'@');
    put_u2(out, pool.utf8("Lcom/acme/Nested;"));
    put_u2(out, 1);
    put_u2(out, pool.utf8("type"));
    out.push(b'c');
    put_u2(out, pool.utf8("Ljava/lang/String;"));
}

/// Zips `(entry name, bytes)` pairs into jar bytes.
pub fn jar_bytes(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in entries {
        writer.start_file(name.as_str(), options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Builds an in-memory jar out of class builders.
pub fn memory_jar(name: &str, classes: &[ClassFileBuilder]) -> MemoryArchive {
    let entries: Vec<(String, Vec<u8>)> = classes
        .iter()
        .map(|class| (class.entry_name(), class.build()))
        .collect();
    MemoryArchive::new(name, jar_bytes(&entries))
}

pub fn boxed(archive: impl Archive + 'static) -> Box<dyn Archive> {
    Box::new(archive)
}

/// Counts how often an archive is opened.
pub struct CountingArchive {
    inner: MemoryArchive,
    opens: Arc<AtomicUsize>,
}

impl CountingArchive {
    pub fn new(inner: MemoryArchive) -> (Self, Arc<AtomicUsize>) {
        let opens = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                opens: Arc::clone(&opens),
            },
            opens,
        )
    }
}

impl Archive for CountingArchive {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send + '_>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.inner.open()
    }
}

pub fn opens(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}
