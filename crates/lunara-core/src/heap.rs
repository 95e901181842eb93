//! Arena heap for tables, closures, and upvalue cells.
//!
//! Objects are appended to per-kind arenas and addressed with typed indices.
//! Nothing is ever freed: values stay alive for the lifetime of the owning
//! state, which is the documented reclamation policy of this runtime.

use crate::table::Table;
use crate::value::TValue;
use std::marker::PhantomData;

/// A typed index into one of the heap arenas.
#[derive(Debug)]
pub struct GcIdx<T>(pub u32, pub PhantomData<T>);

impl<T> GcIdx<T> {
    pub fn new(raw: u32) -> Self {
        GcIdx(raw, PhantomData)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

impl<T> Clone for GcIdx<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for GcIdx<T> {}

impl<T> PartialEq for GcIdx<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl<T> Eq for GcIdx<T> {}

impl<T> std::hash::Hash for GcIdx<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// A scripted closure: a compiled prototype plus its captured upvalues.
///
/// `proto` is a flat index into the owning state's prototype store.
#[derive(Debug)]
pub struct LuaClosure {
    pub proto: usize,
    pub upvalues: Vec<GcIdx<UpVal>>,
}

/// An upvalue cell.
///
/// Open while the frame that owns the captured slot is live; closing copies
/// the value into the cell and ownership passes to it.
#[derive(Debug)]
pub struct UpVal {
    pub location: UpValLocation,
}

#[derive(Debug)]
pub enum UpValLocation {
    /// Points at a slot on the shared value stack.
    Open(usize),
    /// Owns its value.
    Closed(TValue),
}

/// The object heap.
pub struct Heap {
    tables: Vec<Table>,
    closures: Vec<LuaClosure>,
    upvals: Vec<UpVal>,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            tables: Vec::new(),
            closures: Vec::new(),
            upvals: Vec::new(),
        }
    }

    pub fn alloc_table(&mut self, array_hint: usize, hash_hint: usize) -> GcIdx<Table> {
        let idx = self.tables.len() as u32;
        self.tables.push(Table::new(array_hint, hash_hint));
        GcIdx::new(idx)
    }

    pub fn get_table(&self, idx: GcIdx<Table>) -> &Table {
        &self.tables[idx.0 as usize]
    }

    pub fn get_table_mut(&mut self, idx: GcIdx<Table>) -> &mut Table {
        &mut self.tables[idx.0 as usize]
    }

    pub fn alloc_closure(&mut self, proto: usize, upvalues: Vec<GcIdx<UpVal>>) -> GcIdx<LuaClosure> {
        let idx = self.closures.len() as u32;
        self.closures.push(LuaClosure { proto, upvalues });
        GcIdx::new(idx)
    }

    pub fn get_closure(&self, idx: GcIdx<LuaClosure>) -> &LuaClosure {
        &self.closures[idx.0 as usize]
    }

    pub fn alloc_upval(&mut self, location: UpValLocation) -> GcIdx<UpVal> {
        let idx = self.upvals.len() as u32;
        self.upvals.push(UpVal { location });
        GcIdx::new(idx)
    }

    pub fn get_upval(&self, idx: GcIdx<UpVal>) -> &UpVal {
        &self.upvals[idx.0 as usize]
    }

    pub fn get_upval_mut(&mut self, idx: GcIdx<UpVal>) -> &mut UpVal {
        &mut self.upvals[idx.0 as usize]
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
