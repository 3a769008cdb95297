use thiserror::Error;

use super::descriptor::{
    internal_to_binary, parse_field_descriptor, parse_method_descriptor, FieldType,
};
use super::{AccessFlags, ClassFacts, InnerClassEntry, MemberFacts, MemberSignature};

#[derive(Debug, Error)]
pub enum ClassParseError {
    #[error("unexpected end of class file")]
    UnexpectedEof,
    #[error("invalid class file magic header {found:#010x}")]
    InvalidMagic { found: u32 },
    #[error("unsupported constant pool tag {tag} at index {index}")]
    UnsupportedConstant { tag: u8, index: usize },
    #[error("invalid constant pool index {index}")]
    InvalidConstantIndex { index: u16 },
    #[error("malformed descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("unknown annotation element value tag {tag:#04x}")]
    InvalidElementValue { tag: u8 },
}

/// Decodes one class file into the facts the API model needs.
///
/// Method bodies and every attribute not listed below are skipped:
/// `Exceptions`, `RuntimeVisibleAnnotations`, `RuntimeInvisibleAnnotations`,
/// their parameter variants, `InnerClasses` and `EnclosingMethod`.
pub fn parse_class(bytes: &[u8]) -> Result<ClassFacts, ClassParseError> {
    let mut reader = ClassReader::new(bytes);
    reader.expect_magic()?;
    let _minor_version = reader.read_u2()?;
    let _major_version = reader.read_u2()?;
    let constant_pool = ConstantPool::parse(&mut reader)?;

    let access = AccessFlags::from_bits_retain(reader.read_u2()?);
    let this_class = reader.read_u2()?;
    let super_class = reader.read_u2()?;

    let internal_name = constant_pool.class_name(this_class)?.to_string();
    let super_name = match super_class {
        0 => None,
        index => Some(internal_to_binary(constant_pool.class_name(index)?)),
    };

    let interfaces_count = reader.read_u2()?;
    let mut interfaces = Vec::with_capacity(interfaces_count as usize);
    for _ in 0..interfaces_count {
        let index = reader.read_u2()?;
        interfaces.push(internal_to_binary(constant_pool.class_name(index)?));
    }

    let fields_count = reader.read_u2()?;
    let mut fields = Vec::with_capacity(fields_count as usize);
    for _ in 0..fields_count {
        if let Some(field) = read_member(&mut reader, &constant_pool, MemberKind::Field)? {
            fields.push(field);
        }
    }

    let methods_count = reader.read_u2()?;
    let mut methods = Vec::with_capacity(methods_count as usize);
    for _ in 0..methods_count {
        if let Some(method) = read_member(&mut reader, &constant_pool, MemberKind::Method)? {
            methods.push(method);
        }
    }

    let mut annotations = Vec::new();
    let mut inner_classes = Vec::new();
    let mut enclosing_class = None;

    let attributes_count = reader.read_u2()?;
    for _ in 0..attributes_count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let data = reader.read_slice(length)?;
        match constant_pool.utf8(name_index)? {
            "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                annotations.extend(read_annotations(data, &constant_pool)?);
            }
            "InnerClasses" => {
                inner_classes = read_inner_classes(data, &constant_pool)?;
            }
            "EnclosingMethod" => {
                let mut sub_reader = ClassReader::new(data);
                let class_index = sub_reader.read_u2()?;
                let _method_index = sub_reader.read_u2()?;
                enclosing_class = Some(internal_to_binary(constant_pool.class_name(class_index)?));
            }
            _ => {}
        }
    }

    Ok(ClassFacts {
        binary_name: internal_to_binary(&internal_name),
        internal_name,
        access,
        super_name,
        interfaces,
        fields,
        methods,
        annotations,
        inner_classes,
        enclosing_class,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberKind {
    Field,
    Method,
}

fn read_member(
    reader: &mut ClassReader<'_>,
    pool: &ConstantPool,
    kind: MemberKind,
) -> Result<Option<MemberFacts>, ClassParseError> {
    let access = AccessFlags::from_bits_retain(reader.read_u2()?);
    let name = pool.utf8(reader.read_u2()?)?.to_string();
    let descriptor = pool.utf8(reader.read_u2()?)?.to_string();

    let mut exceptions = Vec::new();
    let mut annotations = Vec::new();
    let mut parameter_annotations: Vec<Vec<String>> = Vec::new();

    let attributes_count = reader.read_u2()?;
    for _ in 0..attributes_count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let data = reader.read_slice(length)?;
        match pool.utf8(name_index)? {
            "Exceptions" if kind == MemberKind::Method => {
                let mut sub_reader = ClassReader::new(data);
                let count = sub_reader.read_u2()?;
                for _ in 0..count {
                    let index = sub_reader.read_u2()?;
                    exceptions.push(internal_to_binary(pool.class_name(index)?));
                }
            }
            "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                annotations.extend(read_annotations(data, pool)?);
            }
            "RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations"
                if kind == MemberKind::Method =>
            {
                let per_parameter = read_parameter_annotations(data, pool)?;
                if parameter_annotations.len() < per_parameter.len() {
                    parameter_annotations.resize_with(per_parameter.len(), Vec::new);
                }
                for (slot, found) in parameter_annotations.iter_mut().zip(per_parameter) {
                    slot.extend(found);
                }
            }
            _ => {}
        }
    }

    // ACC_BRIDGE shares its bit with ACC_VOLATILE, so it only means "bridge" on methods.
    let dropped = access.contains(AccessFlags::SYNTHETIC)
        || (kind == MemberKind::Method && access.contains(AccessFlags::BRIDGE))
        || (kind == MemberKind::Method && name == "<clinit>");
    if dropped {
        return Ok(None);
    }

    let signature = match kind {
        MemberKind::Field => MemberSignature::Field(parse_field_descriptor(&descriptor)?),
        MemberKind::Method => MemberSignature::Method(parse_method_descriptor(&descriptor)?),
    };

    Ok(Some(MemberFacts {
        name,
        descriptor,
        access,
        signature,
        exceptions,
        annotations,
        parameter_annotations,
    }))
}

fn read_inner_classes(
    data: &[u8],
    pool: &ConstantPool,
) -> Result<Vec<InnerClassEntry>, ClassParseError> {
    let mut reader = ClassReader::new(data);
    let count = reader.read_u2()?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let inner_index = reader.read_u2()?;
        let outer_index = reader.read_u2()?;
        let name_index = reader.read_u2()?;
        let access = AccessFlags::from_bits_retain(reader.read_u2()?);

        let outer_class = match outer_index {
            0 => None,
            index => Some(pool.class_name(index)?.to_string()),
        };
        let simple_name = match name_index {
            0 => None,
            index => Some(pool.utf8(index)?.to_string()),
        };

        entries.push(InnerClassEntry {
            inner_class: pool.class_name(inner_index)?.to_string(),
            outer_class,
            simple_name,
            access,
        });
    }
    Ok(entries)
}

fn read_annotations(data: &[u8], pool: &ConstantPool) -> Result<Vec<String>, ClassParseError> {
    let mut reader = ClassReader::new(data);
    let count = reader.read_u2()?;
    let mut annotations = Vec::with_capacity(count as usize);
    for _ in 0..count {
        annotations.push(read_annotation(&mut reader, pool)?);
    }
    Ok(annotations)
}

fn read_parameter_annotations(
    data: &[u8],
    pool: &ConstantPool,
) -> Result<Vec<Vec<String>>, ClassParseError> {
    let mut reader = ClassReader::new(data);
    let parameters = reader.read_u1()?;
    let mut result = Vec::with_capacity(parameters as usize);
    for _ in 0..parameters {
        let count = reader.read_u2()?;
        let mut annotations = Vec::with_capacity(count as usize);
        for _ in 0..count {
            annotations.push(read_annotation(&mut reader, pool)?);
        }
        result.push(annotations);
    }
    Ok(result)
}

/// Reads one annotation and returns the binary name of its type.
fn read_annotation(reader: &mut ClassReader<'_>, pool: &ConstantPool) -> Result<String, ClassParseError> {
    let descriptor = pool.utf8(reader.read_u2()?)?;
    let annotation_type = match parse_field_descriptor(descriptor)? {
        FieldType::Object(name) => name,
        _ => return Err(ClassParseError::InvalidDescriptor(descriptor.to_string())),
    };
    skip_element_value_pairs(reader)?;
    Ok(annotation_type)
}

fn skip_element_value_pairs(reader: &mut ClassReader<'_>) -> Result<(), ClassParseError> {
    let pairs = reader.read_u2()?;
    for _ in 0..pairs {
        reader.read_u2()?; // element_name_index
        skip_element_value(reader)?;
    }
    Ok(())
}

fn skip_element_value(reader: &mut ClassReader<'_>) -> Result<(), ClassParseError> {
    match reader.read_u1()? {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => reader.skip(2),
        b'e' => reader.skip(4),
        b'@' => {
            reader.read_u2()?; // type_index
            skip_element_value_pairs(reader)
        }
        b'[' => {
            let values = reader.read_u2()?;
            for _ in 0..values {
                skip_element_value(reader)?;
            }
            Ok(())
        }
        tag => Err(ClassParseError::InvalidElementValue { tag }),
    }
}

#[derive(Debug, Clone)]
enum Constant {
    Utf8(String),
    Class { name_index: u16 },
    Other,
    Unusable,
}

struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    fn parse(reader: &mut ClassReader<'_>) -> Result<Self, ClassParseError> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable); // index 0 unused

        let mut index = 1;
        while index < count {
            let tag = reader.read_u1()?;
            let entry = match tag {
                1 => {
                    let length = reader.read_u2()? as usize;
                    let bytes = reader.read_slice(length)?;
                    // Modified UTF-8 is not always valid UTF-8; names we care about are.
                    Constant::Utf8(String::from_utf8_lossy(bytes).into_owned())
                }
                3 | 4 => {
                    reader.skip(4)?;
                    Constant::Other
                }
                5 | 6 => {
                    reader.skip(8)?;
                    entries.push(Constant::Other);
                    index += 1;
                    Constant::Unusable
                }
                7 => {
                    let name_index = reader.read_u2()?;
                    Constant::Class { name_index }
                }
                8 | 16 | 19 | 20 => {
                    reader.skip(2)?;
                    Constant::Other
                }
                9 | 10 | 11 | 12 | 17 | 18 => {
                    reader.skip(4)?;
                    Constant::Other
                }
                15 => {
                    reader.skip(3)?;
                    Constant::Other
                }
                other => {
                    return Err(ClassParseError::UnsupportedConstant { tag: other, index })
                }
            };
            entries.push(entry);
            index += 1;
        }

        Ok(Self { entries })
    }

    fn get(&self, index: u16) -> Result<&Constant, ClassParseError> {
        self.entries
            .get(index as usize)
            .ok_or(ClassParseError::InvalidConstantIndex { index })
    }

    fn utf8(&self, index: u16) -> Result<&str, ClassParseError> {
        match self.get(index)? {
            Constant::Utf8(value) => Ok(value.as_str()),
            _ => Err(ClassParseError::InvalidConstantIndex { index }),
        }
    }

    fn class_name(&self, index: u16) -> Result<&str, ClassParseError> {
        match self.get(index)? {
            Constant::Class { name_index } => self.utf8(*name_index),
            _ => Err(ClassParseError::InvalidConstantIndex { index }),
        }
    }
}

struct ClassReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ClassReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn expect_magic(&mut self) -> Result<(), ClassParseError> {
        const MAGIC: u32 = 0xCAFEBABE;
        let found = self.read_u4()?;
        if found != MAGIC {
            return Err(ClassParseError::InvalidMagic { found });
        }
        Ok(())
    }

    fn read_u1(&mut self) -> Result<u8, ClassParseError> {
        let value = *self.data.get(self.pos).ok_or(ClassParseError::UnexpectedEof)?;
        self.pos += 1;
        Ok(value)
    }

    fn read_u2(&mut self) -> Result<u16, ClassParseError> {
        let bytes = self.read_slice(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_u4(&mut self) -> Result<u32, ClassParseError> {
        let bytes = self.read_slice(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_slice(&mut self, len: usize) -> Result<&'a [u8], ClassParseError> {
        let end = self.pos.checked_add(len).ok_or(ClassParseError::UnexpectedEof)?;
        if end > self.data.len() {
            return Err(ClassParseError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<(), ClassParseError> {
        self.read_slice(len).map(|_| ())
    }
}
