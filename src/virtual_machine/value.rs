//! Runtime value representation.
//!
//! Scalars are owned; arrays and objects are shared cells so that
//! SET_PROPERTY through a loaded slot mutates the stored container in place,
//! and so EQ/DIFF can compare containers by identity. Conversion to and from
//! the plain [`Value`] form is always a deep copy, which is what isolates
//! artifact storage from execution.

use crate::types::value::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// A value on the VM stack or in storage.
#[derive(Debug, Clone)]
pub enum VmValue {
    Null,
    Int(i64),
    Double(f64),
    Str(String),
    Array(Rc<RefCell<Vec<VmValue>>>),
    Object(Rc<RefCell<BTreeMap<String, VmValue>>>),
}

impl VmValue {
    /// Returns the type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            VmValue::Null => "Null",
            VmValue::Int(_) => "Int",
            VmValue::Double(_) => "Double",
            VmValue::Str(_) => "Str",
            VmValue::Array(_) => "Array",
            VmValue::Object(_) => "Object",
        }
    }

    /// Wraps a vector in a fresh array cell.
    pub fn array(items: Vec<VmValue>) -> VmValue {
        VmValue::Array(Rc::new(RefCell::new(items)))
    }

    /// Creates a fresh empty object cell.
    pub fn empty_object() -> VmValue {
        VmValue::Object(Rc::new(RefCell::new(BTreeMap::new())))
    }

    /// Builds a runtime value from its plain form. Containers are rebuilt
    /// recursively, so the result shares nothing with the input.
    pub fn from_plain(value: &Value) -> VmValue {
        match value {
            Value::Null => VmValue::Null,
            Value::Int(v) => VmValue::Int(*v),
            Value::Double(v) => VmValue::Double(*v),
            Value::Str(v) => VmValue::Str(v.clone()),
            Value::Array(items) => VmValue::array(items.iter().map(VmValue::from_plain).collect()),
            Value::Object(fields) => VmValue::Object(Rc::new(RefCell::new(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), VmValue::from_plain(v)))
                    .collect(),
            ))),
        }
    }

    /// Converts back to the plain form by deep copy.
    pub fn to_plain(&self) -> Value {
        match self {
            VmValue::Null => Value::Null,
            VmValue::Int(v) => Value::Int(*v),
            VmValue::Double(v) => Value::Double(*v),
            VmValue::Str(v) => Value::Str(v.clone()),
            VmValue::Array(items) => {
                Value::Array(items.borrow().iter().map(VmValue::to_plain).collect())
            }
            VmValue::Object(fields) => Value::Object(
                fields
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_plain()))
                    .collect(),
            ),
        }
    }

    /// Clones the value into fresh cells, severing all sharing.
    pub fn deep_copy(&self) -> VmValue {
        match self {
            VmValue::Array(items) => {
                VmValue::array(items.borrow().iter().map(VmValue::deep_copy).collect())
            }
            VmValue::Object(fields) => VmValue::Object(Rc::new(RefCell::new(
                fields
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.deep_copy()))
                    .collect(),
            ))),
            other => other.clone(),
        }
    }

    /// VM equality: structural for scalars, identity for containers.
    pub fn vm_eq(&self, other: &VmValue) -> bool {
        match (self, other) {
            (VmValue::Null, VmValue::Null) => true,
            (VmValue::Int(a), VmValue::Int(b)) => a == b,
            (VmValue::Double(a), VmValue::Double(b)) => a == b,
            (VmValue::Str(a), VmValue::Str(b)) => a == b,
            (VmValue::Array(a), VmValue::Array(b)) => Rc::ptr_eq(a, b),
            (VmValue::Object(a), VmValue::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for VmValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmValue::Null => write!(f, "null"),
            VmValue::Int(v) => write!(f, "{}", v),
            VmValue::Double(v) => write!(f, "{}", v),
            VmValue::Str(v) => write!(f, "{}", v),
            VmValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            VmValue::Object(fields) => {
                write!(f, "{{")?;
                for (i, (key, value)) in fields.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_roundtrip_preserves_structure() {
        let mut fields = BTreeMap::new();
        fields.insert("age".to_string(), Value::Int(3));
        fields.insert("name".to_string(), Value::from("a"));
        let plain = Value::Array(vec![Value::Object(fields), Value::Double(2.5), Value::Null]);

        let runtime = VmValue::from_plain(&plain);
        assert_eq!(runtime.to_plain(), plain);
    }

    #[test]
    fn from_plain_shares_nothing_with_later_conversions() {
        let plain = Value::Array(vec![Value::Int(1)]);
        let a = VmValue::from_plain(&plain);
        let b = VmValue::from_plain(&plain);
        assert!(!a.vm_eq(&b), "separate conversions must not share cells");
    }

    #[test]
    fn deep_copy_severs_sharing() {
        let original = VmValue::empty_object();
        if let VmValue::Object(cell) = &original {
            cell.borrow_mut()
                .insert("k".to_string(), VmValue::Int(1));
        }
        let copy = original.deep_copy();
        assert!(!original.vm_eq(&copy));

        if let VmValue::Object(cell) = &original {
            cell.borrow_mut()
                .insert("k".to_string(), VmValue::Int(2));
        }
        if let VmValue::Object(cell) = &copy {
            assert!(matches!(cell.borrow().get("k"), Some(VmValue::Int(1))));
        }
    }

    #[test]
    fn scalar_equality_is_structural() {
        assert!(VmValue::Int(5).vm_eq(&VmValue::Int(5)));
        assert!(!VmValue::Int(5).vm_eq(&VmValue::Int(6)));
        assert!(VmValue::Str("a".into()).vm_eq(&VmValue::Str("a".into())));
        assert!(VmValue::Null.vm_eq(&VmValue::Null));
    }

    #[test]
    fn cross_type_scalars_are_not_equal() {
        assert!(!VmValue::Int(2).vm_eq(&VmValue::Double(2.0)));
        assert!(!VmValue::Int(0).vm_eq(&VmValue::Null));
    }

    #[test]
    fn container_equality_is_identity() {
        let a = VmValue::array(vec![VmValue::Int(1)]);
        let b = VmValue::array(vec![VmValue::Int(1)]);
        assert!(!a.vm_eq(&b));
        assert!(a.vm_eq(&a.clone()), "clone shares the cell");
    }

    #[test]
    fn display_forms() {
        assert_eq!(VmValue::Int(5).to_string(), "5");
        assert_eq!(VmValue::Str("hi".into()).to_string(), "hi");
        assert_eq!(
            VmValue::array(vec![VmValue::Int(1), VmValue::Int(2)]).to_string(),
            "[1, 2]"
        );
    }
}
