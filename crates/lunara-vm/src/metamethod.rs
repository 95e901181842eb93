//! Metamethod names and raw lookup.

use lunara_core::heap::Heap;
use lunara_core::string::{StringId, StringInterner};
use lunara_core::value::TValue;

/// Pre-interned metamethod name ids.
pub struct MetamethodNames {
    pub add: StringId,
    pub sub: StringId,
    pub mul: StringId,
    pub div: StringId,
    pub mod_: StringId,
    pub pow: StringId,
    pub idiv: StringId,
    pub band: StringId,
    pub bor: StringId,
    pub bxor: StringId,
    pub shl: StringId,
    pub shr: StringId,
    pub unm: StringId,
    pub bnot: StringId,
    pub len: StringId,
    pub concat: StringId,
    pub eq: StringId,
    pub lt: StringId,
    pub le: StringId,
    pub index: StringId,
    pub newindex: StringId,
    pub call: StringId,
}

impl MetamethodNames {
    pub fn init(strings: &mut StringInterner) -> Self {
        MetamethodNames {
            add: strings.intern(b"__add"),
            sub: strings.intern(b"__sub"),
            mul: strings.intern(b"__mul"),
            div: strings.intern(b"__div"),
            mod_: strings.intern(b"__mod"),
            pow: strings.intern(b"__pow"),
            idiv: strings.intern(b"__idiv"),
            band: strings.intern(b"__band"),
            bor: strings.intern(b"__bor"),
            bxor: strings.intern(b"__bxor"),
            shl: strings.intern(b"__shl"),
            shr: strings.intern(b"__shr"),
            unm: strings.intern(b"__unm"),
            bnot: strings.intern(b"__bnot"),
            len: strings.intern(b"__len"),
            concat: strings.intern(b"__concat"),
            eq: strings.intern(b"__eq"),
            lt: strings.intern(b"__lt"),
            le: strings.intern(b"__le"),
            index: strings.intern(b"__index"),
            newindex: strings.intern(b"__newindex"),
            call: strings.intern(b"__call"),
        }
    }
}

/// Raw lookup of a metamethod on a value. Only tables carry metatables in
/// this value model. The lookup itself never consults metamethods, which is
/// what keeps `__index` chains from recursing through here.
pub fn get_metamethod(val: TValue, name: StringId, heap: &Heap) -> Option<TValue> {
    let table_idx = val.as_table_idx()?;
    let mt = heap.get_table(table_idx).metatable?;
    let mm = heap.get_table(mt).get_str(name);
    if mm.is_nil() {
        None
    } else {
        Some(mm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_handler() {
        let mut strings = StringInterner::new();
        let names = MetamethodNames::init(&mut strings);
        let mut heap = Heap::new();
        let t = heap.alloc_table(0, 0);
        let mt = heap.alloc_table(0, 0);
        assert!(get_metamethod(TValue::Table(t), names.index, &heap).is_none());

        heap.get_table_mut(t).metatable = Some(mt);
        assert!(get_metamethod(TValue::Table(t), names.index, &heap).is_none());

        heap.get_table_mut(mt).set_str(names.index, TValue::Integer(1));
        assert_eq!(
            get_metamethod(TValue::Table(t), names.index, &heap),
            Some(TValue::Integer(1))
        );
    }

    #[test]
    fn non_tables_have_no_metamethods() {
        let mut strings = StringInterner::new();
        let names = MetamethodNames::init(&mut strings);
        let heap = Heap::new();
        assert!(get_metamethod(TValue::Integer(1), names.add, &heap).is_none());
        assert!(get_metamethod(TValue::Nil, names.index, &heap).is_none());
    }
}
