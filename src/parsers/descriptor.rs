use serde::{Deserialize, Serialize};

use super::classfile::ClassParseError;

/// A decoded JVM field descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Primitive(char),
    /// Binary name of a class or interface type.
    Object(String),
    Array {
        element: Box<FieldType>,
        dimensions: usize,
    },
}

impl FieldType {
    /// The named type this descriptor mentions, looking through array dimensions.
    /// Primitives mention none.
    pub fn referenced_type(&self) -> Option<&str> {
        match self {
            FieldType::Primitive(_) => None,
            FieldType::Object(name) => Some(name.as_str()),
            FieldType::Array { element, .. } => element.referenced_type(),
        }
    }
}

/// A decoded JVM method descriptor. `return_type` is `None` for `void`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,
    pub return_type: Option<FieldType>,
}

pub fn internal_to_binary(internal_name: &str) -> String {
    internal_name.replace('/', ".")
}

pub fn parse_field_descriptor(descriptor: &str) -> Result<FieldType, ClassParseError> {
    let mut parser = DescriptorParser::new(descriptor);
    let ty = parser.parse_type()?;
    if parser.remaining() != 0 {
        return Err(ClassParseError::InvalidDescriptor(descriptor.to_string()));
    }
    Ok(ty)
}

pub fn parse_method_descriptor(descriptor: &str) -> Result<MethodDescriptor, ClassParseError> {
    let mut parser = DescriptorParser::new(descriptor);
    parser.expect(b'(')?;
    let mut parameters = Vec::new();
    while !parser.peek(b')')? {
        parameters.push(parser.parse_type()?);
    }
    parser.expect(b')')?;

    let return_type = if parser.peek(b'V')? {
        parser.advance(1);
        None
    } else {
        Some(parser.parse_type()?)
    };

    if parser.remaining() != 0 {
        return Err(ClassParseError::InvalidDescriptor(descriptor.to_string()));
    }

    Ok(MethodDescriptor {
        parameters,
        return_type,
    })
}

struct DescriptorParser<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> DescriptorParser<'a> {
    fn new(descriptor: &'a str) -> Self {
        Self {
            source: descriptor,
            bytes: descriptor.as_bytes(),
            pos: 0,
        }
    }

    fn malformed(&self) -> ClassParseError {
        ClassParseError::InvalidDescriptor(self.source.to_string())
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    fn expect(&mut self, byte: u8) -> Result<(), ClassParseError> {
        if self.remaining() < 1 || self.bytes[self.pos] != byte {
            return Err(self.malformed());
        }
        self.pos += 1;
        Ok(())
    }

    fn advance(&mut self, count: usize) {
        self.pos += count;
    }

    fn peek(&self, byte: u8) -> Result<bool, ClassParseError> {
        if self.remaining() < 1 {
            return Err(self.malformed());
        }
        Ok(self.bytes[self.pos] == byte)
    }

    fn parse_type(&mut self) -> Result<FieldType, ClassParseError> {
        if self.remaining() == 0 {
            return Err(self.malformed());
        }

        match self.bytes[self.pos] {
            tag @ (b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z') => {
                self.pos += 1;
                Ok(FieldType::Primitive(tag as char))
            }
            b'L' => self.parse_object_type(),
            b'[' => self.parse_array_type(),
            _ => Err(self.malformed()),
        }
    }

    fn parse_object_type(&mut self) -> Result<FieldType, ClassParseError> {
        self.expect(b'L')?;
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b';' {
            self.pos += 1;
        }
        if self.pos >= self.bytes.len() || self.pos == start {
            return Err(self.malformed());
        }
        let name = &self.source[start..self.pos];
        self.pos += 1; // consume ';'
        Ok(FieldType::Object(internal_to_binary(name)))
    }

    fn parse_array_type(&mut self) -> Result<FieldType, ClassParseError> {
        let mut dimensions = 0;
        while self.remaining() > 0 && self.bytes[self.pos] == b'[' {
            dimensions += 1;
            self.pos += 1;
        }
        let element = self.parse_type()?;
        Ok(FieldType::Array {
            element: Box::new(element),
            dimensions,
        })
    }
}
