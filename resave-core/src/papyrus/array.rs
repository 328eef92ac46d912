use crate::config::Layout;
use crate::error::{ParseResultExt, Result};
use crate::ids::Handle;
use crate::io::{read_list, Element, SaveReader, SaveWriter};
use crate::strings::{StringTable, TString};
use crate::variable::{VarType, Variable};

/// Header entry of a VM array. The element values follow later, in [`ArrayData`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayInfo {
    pub handle: Handle,
    pub elem: VarType,
    /// Script or struct name, for reference element types only.
    pub ty: Option<TString>,
    pub length: u32,
}

impl ArrayInfo {
    pub fn read(r: &mut SaveReader<'_>, strings: &StringTable) -> Result<Self> {
        let handle = Handle::read(r)?;
        let elem = VarType::read(r)?;
        let ty = if elem.is_reference_kind() { Some(TString::read(r, strings)?) } else { None };
        let length = r.read_count_i32("array length", 0, i32::MAX)? as u32;
        Ok(Self { handle, elem, ty, length })
    }
}

impl Element for ArrayInfo {
    fn write(&self, w: &mut SaveWriter) {
        self.handle.write(w);
        w.write_u8(self.elem.tag());
        self.ty.write(w);
        w.write_i32(self.length as i32);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        layout.handle_bytes() + 1 + self.ty.calculate_size(layout) + 4
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArrayData {
    pub handle: Handle,
    pub elements: Vec<Variable>,
}

impl ArrayData {
    /// `length` comes from the matching [`ArrayInfo`].
    pub fn read(r: &mut SaveReader<'_>, strings: &StringTable, handle: Handle, length: usize) -> Result<Self> {
        let elements = read_list(r, length, "element", |r| Variable::read(r, strings))
            .with_element(|| format!("array {handle}"))?;
        Ok(Self { handle, elements })
    }
}

impl Element for ArrayData {
    fn write(&self, w: &mut SaveWriter) {
        self.handle.write(w);
        self.elements.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        layout.handle_bytes() + self.elements.calculate_size(layout)
    }
}
