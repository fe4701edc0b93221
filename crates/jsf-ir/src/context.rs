//! Context flags describing which kinds of instructions are legal at a point.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A fixed-width set of context flags.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Context(u16);

impl Context {
    pub const EMPTY: Context = Context(0);
    /// Ordinary statement-level code. Present at the top level and in every
    /// function body, absent in object literal and class bodies.
    pub const SCRIPT: Context = Context(1 << 0);
    pub const SUBROUTINE: Context = Context(1 << 1);
    pub const METHOD: Context = Context(1 << 2);
    pub const CLASS_METHOD: Context = Context(1 << 3);
    pub const ASYNC_FUNCTION: Context = Context(1 << 4);
    pub const GENERATOR_FUNCTION: Context = Context(1 << 5);
    pub const LOOP: Context = Context(1 << 6);
    pub const WITH: Context = Context(1 << 7);
    pub const OBJECT_LITERAL: Context = Context(1 << 8);
    pub const CLASS_DEFINITION: Context = Context(1 << 9);
    /// Strict mode code. Entered by class members and kept by every nested
    /// function, unlike the other flags.
    pub const STRICT: Context = Context(1 << 10);
    /// `super(...)` may be called: the body of a constructor of a class
    /// with a superclass.
    pub const SUPER_CALL: Context = Context(1 << 11);
    pub const ALL: Context = Context(u16::MAX);

    const NAMES: [(Context, &'static str); 12] = [
        (Context::SCRIPT, "script"),
        (Context::SUBROUTINE, "subroutine"),
        (Context::METHOD, "method"),
        (Context::CLASS_METHOD, "classMethod"),
        (Context::ASYNC_FUNCTION, "asyncFunction"),
        (Context::GENERATOR_FUNCTION, "generatorFunction"),
        (Context::LOOP, "loop"),
        (Context::WITH, "with"),
        (Context::OBJECT_LITERAL, "objectLiteral"),
        (Context::CLASS_DEFINITION, "classDefinition"),
        (Context::STRICT, "strict"),
        (Context::SUPER_CALL, "superCall"),
    ];

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn from_bits(bits: u16) -> Self {
        Context(bits)
    }

    pub const fn union(self, other: Context) -> Context {
        Context(self.0 | other.0)
    }

    pub const fn difference(self, other: Context) -> Context {
        Context(self.0 & !other.0)
    }

    pub const fn intersection(self, other: Context) -> Context {
        Context(self.0 & other.0)
    }

    /// True if every flag of `other` is set in `self`
    pub const fn contains(self, other: Context) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Context) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// `required ⊆ self` and `incompatible ∩ self = ∅`
    pub const fn permits(self, required: Context, incompatible: Context) -> bool {
        self.contains(required) && !self.intersects(incompatible)
    }
}

impl BitOr for Context {
    type Output = Context;

    fn bitor(self, rhs: Context) -> Context {
        self.union(rhs)
    }
}

impl BitOrAssign for Context {
    fn bitor_assign(&mut self, rhs: Context) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "[{}]", names.join(", "))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_operations() {
        let ctx = Context::SCRIPT | Context::SUBROUTINE;
        assert!(ctx.contains(Context::SCRIPT));
        assert!(ctx.contains(Context::EMPTY));
        assert!(!ctx.contains(Context::LOOP));
        assert!(ctx.intersects(Context::SUBROUTINE | Context::LOOP));
        assert_eq!(ctx.difference(Context::SCRIPT), Context::SUBROUTINE);
        assert_eq!(ctx.intersection(Context::SCRIPT | Context::LOOP), Context::SCRIPT);
        assert_eq!(Context::ALL.intersection(ctx), ctx);
    }

    #[test]
    fn test_permits() {
        let ctx = Context::SCRIPT | Context::CLASS_METHOD;
        assert!(ctx.permits(Context::SCRIPT, Context::EMPTY));
        assert!(!ctx.permits(Context::SCRIPT, Context::CLASS_METHOD));
        assert!(!ctx.permits(Context::LOOP, Context::EMPTY));
    }

    #[test]
    fn test_display() {
        assert_eq!((Context::SCRIPT | Context::LOOP).to_string(), "[script, loop]");
        assert_eq!(Context::EMPTY.to_string(), "[]");
        assert_eq!(
            (Context::STRICT | Context::SUPER_CALL).to_string(),
            "[strict, superCall]"
        );
    }
}
