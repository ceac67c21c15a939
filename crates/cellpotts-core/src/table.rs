//! Row-per-cell state stored as a structure of arrays.

use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::estimate_perimeter;
use crate::{CellId, MEDIUM, MEDIUM_NAME, TypeId};

/// Errors raised by table operations. The table is left untouched on error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    /// Indicates input values that cannot be used (e.g., a zero desired volume).
    #[error("invalid table input: {0}")]
    InvalidInput(&'static str),
    /// Parallel lists or value lists of the wrong length.
    #[error("expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("cell {0} does not exist")]
    UnknownCell(CellId),
    #[error("cell type `{0}` does not exist")]
    UnknownType(String),
    #[error("cell type `{0}` is listed more than once")]
    DuplicateType(String),
    #[error("property `{0}` already exists")]
    DuplicateProperty(String),
    #[error("property `{0}` does not exist")]
    UnknownProperty(String),
    /// A value does not match the kind of its column.
    #[error("property `{name}` holds {expected:?} values, got {actual:?}")]
    KindMismatch {
        name: String,
        expected: PropertyKind,
        actual: PropertyKind,
    },
}

/// Value kinds supported by property columns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Int,
    Float,
    Bool,
    Text,
    Position,
}

/// A single property value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PropertyValue {
    Int(i64),
    Float(OrderedFloat<f64>),
    Bool(bool),
    Text(String),
    /// Grid coordinates, x first.
    Position(Vec<usize>),
}

impl PropertyValue {
    #[must_use]
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Int(_) => PropertyKind::Int,
            PropertyValue::Float(_) => PropertyKind::Float,
            PropertyValue::Bool(_) => PropertyKind::Bool,
            PropertyValue::Text(_) => PropertyKind::Text,
            PropertyValue::Position(_) => PropertyKind::Position,
        }
    }

    #[must_use]
    pub fn as_position(&self) -> Option<&[usize]> {
        match self {
            PropertyValue::Position(coords) => Some(coords),
            _ => None,
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(OrderedFloat(value))
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<Vec<usize>> for PropertyValue {
    fn from(value: Vec<usize>) -> Self {
        PropertyValue::Position(value)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Int(v) => write!(f, "{v}"),
            PropertyValue::Float(v) => write!(f, "{}", v.into_inner()),
            PropertyValue::Bool(v) => write!(f, "{v}"),
            PropertyValue::Text(v) => write!(f, "{v}"),
            PropertyValue::Position(coords) => {
                let parts: Vec<String> = coords.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

/// One typed column; `None` marks a row without a value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum PropertyColumn {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    Text(Vec<Option<String>>),
    Position(Vec<Option<Vec<usize>>>),
}

impl PropertyColumn {
    fn missing(kind: PropertyKind, len: usize) -> Self {
        match kind {
            PropertyKind::Int => PropertyColumn::Int(vec![None; len]),
            PropertyKind::Float => PropertyColumn::Float(vec![None; len]),
            PropertyKind::Bool => PropertyColumn::Bool(vec![None; len]),
            PropertyKind::Text => PropertyColumn::Text(vec![None; len]),
            PropertyKind::Position => PropertyColumn::Position(vec![None; len]),
        }
    }

    #[must_use]
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyColumn::Int(_) => PropertyKind::Int,
            PropertyColumn::Float(_) => PropertyKind::Float,
            PropertyColumn::Bool(_) => PropertyKind::Bool,
            PropertyColumn::Text(_) => PropertyKind::Text,
            PropertyColumn::Position(_) => PropertyKind::Position,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            PropertyColumn::Int(v) => v.len(),
            PropertyColumn::Float(v) => v.len(),
            PropertyColumn::Bool(v) => v.len(),
            PropertyColumn::Text(v) => v.len(),
            PropertyColumn::Position(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `row`, `None` when the row has no value or does not exist.
    #[must_use]
    pub fn get(&self, row: usize) -> Option<PropertyValue> {
        match self {
            PropertyColumn::Int(v) => v.get(row).copied().flatten().map(PropertyValue::Int),
            PropertyColumn::Float(v) => v
                .get(row)
                .copied()
                .flatten()
                .map(|x| PropertyValue::Float(OrderedFloat(x))),
            PropertyColumn::Bool(v) => v.get(row).copied().flatten().map(PropertyValue::Bool),
            PropertyColumn::Text(v) => v.get(row).cloned().flatten().map(PropertyValue::Text),
            PropertyColumn::Position(v) => {
                v.get(row).cloned().flatten().map(PropertyValue::Position)
            }
        }
    }

    /// True when `row` exists and carries the "no value" marker.
    #[must_use]
    pub fn is_missing(&self, row: usize) -> bool {
        row < self.len() && self.get(row).is_none()
    }

    /// Borrow the coordinates stored in a position column.
    #[must_use]
    pub fn positions(&self) -> Option<&[Option<Vec<usize>>]> {
        match self {
            PropertyColumn::Position(v) => Some(v),
            _ => None,
        }
    }

    // Callers check the kind first.
    fn push(&mut self, value: Option<PropertyValue>) {
        match (self, value) {
            (PropertyColumn::Int(v), Some(PropertyValue::Int(x))) => v.push(Some(x)),
            (PropertyColumn::Float(v), Some(PropertyValue::Float(x))) => v.push(Some(x.0)),
            (PropertyColumn::Bool(v), Some(PropertyValue::Bool(x))) => v.push(Some(x)),
            (PropertyColumn::Text(v), Some(PropertyValue::Text(x))) => v.push(Some(x)),
            (PropertyColumn::Position(v), Some(PropertyValue::Position(x))) => v.push(Some(x)),
            (column, _) => column.push_missing(),
        }
    }

    fn push_missing(&mut self) {
        match self {
            PropertyColumn::Int(v) => v.push(None),
            PropertyColumn::Float(v) => v.push(None),
            PropertyColumn::Bool(v) => v.push(None),
            PropertyColumn::Text(v) => v.push(None),
            PropertyColumn::Position(v) => v.push(None),
        }
    }

    fn remove(&mut self, row: usize) {
        match self {
            PropertyColumn::Int(v) => {
                v.remove(row);
            }
            PropertyColumn::Float(v) => {
                v.remove(row);
            }
            PropertyColumn::Bool(v) => {
                v.remove(row);
            }
            PropertyColumn::Text(v) => {
                v.remove(row);
            }
            PropertyColumn::Position(v) => {
                v.remove(row);
            }
        }
    }
}

/// Which rows receive a scoped default value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyScope {
    /// Every row, medium included.
    All,
    /// Only cells whose type name is listed; everything else gets no value.
    Types(Vec<String>),
}

/// Input description of a new cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    /// Type name; cells sharing a name share penalty parameters.
    pub name: String,
    pub desired_volume: u32,
    /// Overrides the compactness estimate derived from `desired_volume`.
    pub desired_perimeter: Option<u32>,
    /// Values for existing property columns; unlisted columns get no value.
    pub properties: Vec<(String, PropertyValue)>,
}

impl CellRecord {
    #[must_use]
    pub fn new(name: impl Into<String>, desired_volume: u32) -> Self {
        Self {
            name: name.into(),
            desired_volume,
            desired_perimeter: None,
            properties: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_desired_perimeter(mut self, perimeter: u32) -> Self {
        self.desired_perimeter = Some(perimeter);
        self
    }

    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.push((name.into(), value.into()));
        self
    }
}

/// Copy of one table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRow {
    pub id: CellId,
    pub name: String,
    pub type_id: TypeId,
    pub volume: u32,
    pub desired_volume: u32,
    pub perimeter: u32,
    pub desired_perimeter: u32,
    pub properties: Vec<(String, Option<PropertyValue>)>,
}

/// Cell state table. Row index equals cell id; row 0 is medium.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellTable {
    type_names: Vec<String>,
    names: Vec<String>,
    type_ids: Vec<TypeId>,
    volumes: Vec<u32>,
    desired_volumes: Vec<u32>,
    perimeters: Vec<u32>,
    desired_perimeters: Vec<u32>,
    properties: Vec<(String, PropertyColumn)>,
}

impl Default for CellTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CellTable {
    /// Create a table holding only the medium row.
    #[must_use]
    pub fn new() -> Self {
        Self {
            type_names: vec![MEDIUM_NAME.to_owned()],
            names: vec![MEDIUM_NAME.to_owned()],
            type_ids: vec![0],
            volumes: vec![0],
            desired_volumes: vec![0],
            perimeters: vec![0],
            desired_perimeters: vec![0],
            properties: Vec::new(),
        }
    }

    /// Build a table from parallel lists of type names, desired volumes and counts.
    ///
    /// Types are numbered from 1 in list order and cells are created type by
    /// type. A count of zero still registers the type.
    pub fn from_types<S: AsRef<str>>(
        names: &[S],
        desired_volumes: &[u32],
        counts: &[usize],
    ) -> Result<Self, TableError> {
        if desired_volumes.len() != names.len() {
            return Err(TableError::LengthMismatch {
                expected: names.len(),
                actual: desired_volumes.len(),
            });
        }
        if counts.len() != names.len() {
            return Err(TableError::LengthMismatch {
                expected: names.len(),
                actual: counts.len(),
            });
        }
        for (i, name) in names.iter().enumerate() {
            let name = name.as_ref();
            Self::validate_type_name(name)?;
            if names[..i].iter().any(|other| other.as_ref() == name) {
                return Err(TableError::DuplicateType(name.to_owned()));
            }
        }
        if desired_volumes.contains(&0) {
            return Err(TableError::InvalidInput("desired volumes must be positive"));
        }

        let total: usize = counts.iter().sum();
        let mut table = Self::with_capacity(total + 1);
        for ((name, &volume), &count) in names.iter().zip(desired_volumes).zip(counts) {
            let type_id = table.register_type(name.as_ref())?;
            for _ in 0..count {
                table.push_row(name.as_ref(), type_id, volume, estimate_perimeter(volume));
            }
        }
        Ok(table)
    }

    fn with_capacity(capacity: usize) -> Self {
        let mut table = Self::new();
        table.names.reserve(capacity);
        table.type_ids.reserve(capacity);
        table.volumes.reserve(capacity);
        table.desired_volumes.reserve(capacity);
        table.perimeters.reserve(capacity);
        table.desired_perimeters.reserve(capacity);
        table
    }

    fn validate_type_name(name: &str) -> Result<(), TableError> {
        if name.is_empty() {
            return Err(TableError::InvalidInput("type names must be non-empty"));
        }
        if name == MEDIUM_NAME {
            return Err(TableError::InvalidInput("the medium type is reserved"));
        }
        Ok(())
    }

    /// Register a type name, returning its id. Existing names return their id.
    pub fn register_type(&mut self, name: &str) -> Result<TypeId, TableError> {
        if let Some(id) = self.type_id(name) {
            if id == 0 {
                return Err(TableError::InvalidInput("the medium type is reserved"));
            }
            return Ok(id);
        }
        Self::validate_type_name(name)?;
        self.type_names.push(name.to_owned());
        Ok((self.type_names.len() - 1) as TypeId)
    }

    fn push_row(&mut self, name: &str, type_id: TypeId, desired_volume: u32, desired_perimeter: u32) {
        self.names.push(name.to_owned());
        self.type_ids.push(type_id);
        self.volumes.push(0);
        self.desired_volumes.push(desired_volume);
        self.perimeters.push(0);
        self.desired_perimeters.push(desired_perimeter);
        for (_, column) in &mut self.properties {
            column.push_missing();
        }
        self.debug_assert_coherent();
    }

    /// Number of rows, medium included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Never true; the medium row always exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Number of cells, medium excluded.
    #[must_use]
    pub fn count_cells(&self) -> usize {
        self.len() - 1
    }

    /// Number of distinct types among live cells.
    #[must_use]
    pub fn count_cell_types(&self) -> usize {
        let mut seen = vec![false; self.type_names.len()];
        for &type_id in &self.type_ids[1..] {
            seen[type_id as usize] = true;
        }
        seen.iter().filter(|&&s| s).count()
    }

    /// Number of registered types, medium excluded; penalty parameters are sized by this.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.type_names.len() - 1
    }

    /// Registered type names indexed by type id.
    #[must_use]
    pub fn type_names(&self) -> &[String] {
        &self.type_names
    }

    #[must_use]
    pub fn type_id(&self, name: &str) -> Option<TypeId> {
        self.type_names
            .iter()
            .position(|n| n == name)
            .map(|i| i as TypeId)
    }

    #[must_use]
    pub fn contains(&self, id: CellId) -> bool {
        (id as usize) < self.len()
    }

    /// Live cell ids in ascending order.
    pub fn cell_ids(&self) -> impl Iterator<Item = CellId> + '_ {
        (1..self.len()).map(|i| i as CellId)
    }

    /// Type of cell `id`; medium is type 0.
    #[inline]
    #[must_use]
    pub fn type_of(&self, id: CellId) -> TypeId {
        self.type_ids[id as usize]
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn type_ids(&self) -> &[TypeId] {
        &self.type_ids
    }

    #[must_use]
    pub fn volumes(&self) -> &[u32] {
        &self.volumes
    }

    #[must_use]
    pub fn desired_volumes(&self) -> &[u32] {
        &self.desired_volumes
    }

    #[must_use]
    pub fn perimeters(&self) -> &[u32] {
        &self.perimeters
    }

    #[must_use]
    pub fn desired_perimeters(&self) -> &[u32] {
        &self.desired_perimeters
    }

    pub(crate) fn volumes_mut(&mut self) -> &mut [u32] {
        &mut self.volumes
    }

    pub(crate) fn perimeters_mut(&mut self) -> &mut [u32] {
        &mut self.perimeters
    }

    /// Add a cell and return its id.
    pub fn add_cell(&mut self, record: CellRecord) -> Result<CellId, TableError> {
        if record.desired_volume == 0 {
            return Err(TableError::InvalidInput("desired volume must be positive"));
        }
        Self::validate_type_name(&record.name)?;
        for (i, (name, value)) in record.properties.iter().enumerate() {
            let column = self
                .property(name)
                .ok_or_else(|| TableError::UnknownProperty(name.clone()))?;
            if column.kind() != value.kind() {
                return Err(TableError::KindMismatch {
                    name: name.clone(),
                    expected: column.kind(),
                    actual: value.kind(),
                });
            }
            if record.properties[..i].iter().any(|(other, _)| other == name) {
                return Err(TableError::DuplicateProperty(name.clone()));
            }
        }

        let type_id = self.register_type(&record.name)?;
        let desired_perimeter = record
            .desired_perimeter
            .unwrap_or_else(|| estimate_perimeter(record.desired_volume));
        let row = self.len();
        self.push_row(&record.name, type_id, record.desired_volume, desired_perimeter);
        for (name, value) in record.properties {
            if let Some((_, column)) = self.properties.iter_mut().find(|(n, _)| *n == name) {
                // Replace the missing marker push_row just appended.
                column.remove(row);
                column.push(Some(value));
            }
        }
        Ok(row as CellId)
    }

    /// Add a column with one default value for the rows in `scope`; other rows get no value.
    pub fn add_property(
        &mut self,
        name: &str,
        default: impl Into<PropertyValue>,
        scope: PropertyScope,
    ) -> Result<(), TableError> {
        let default = default.into();
        self.check_new_property(name)?;
        let selected: Vec<bool> = match &scope {
            PropertyScope::All => vec![true; self.len()],
            PropertyScope::Types(types) => {
                let mut wanted = vec![false; self.type_names.len()];
                for type_name in types {
                    match self.type_id(type_name) {
                        Some(id) if id != 0 => wanted[id as usize] = true,
                        _ => return Err(TableError::UnknownType(type_name.clone())),
                    }
                }
                self.type_ids.iter().map(|&t| wanted[t as usize]).collect()
            }
        };

        let mut column = PropertyColumn::missing(default.kind(), 0);
        for keep in selected {
            column.push(keep.then(|| default.clone()));
        }
        self.properties.push((name.to_owned(), column));
        Ok(())
    }

    /// Add a column from one value per cell in id order; medium gets no value.
    pub fn add_property_values(
        &mut self,
        name: &str,
        values: Vec<PropertyValue>,
    ) -> Result<(), TableError> {
        self.check_new_property(name)?;
        if values.len() != self.count_cells() {
            return Err(TableError::LengthMismatch {
                expected: self.count_cells(),
                actual: values.len(),
            });
        }
        let Some(kind) = values.first().map(PropertyValue::kind) else {
            self.properties
                .push((name.to_owned(), PropertyColumn::Int(vec![None])));
            return Ok(());
        };
        if let Some(bad) = values.iter().find(|v| v.kind() != kind) {
            return Err(TableError::KindMismatch {
                name: name.to_owned(),
                expected: kind,
                actual: bad.kind(),
            });
        }

        let mut column = PropertyColumn::missing(kind, 1);
        for value in values {
            column.push(Some(value));
        }
        self.properties.push((name.to_owned(), column));
        Ok(())
    }

    fn check_new_property(&self, name: &str) -> Result<(), TableError> {
        if name.is_empty() {
            return Err(TableError::InvalidInput("property names must be non-empty"));
        }
        if self.property(name).is_some() {
            return Err(TableError::DuplicateProperty(name.to_owned()));
        }
        Ok(())
    }

    /// Remove cell `id`; every cell above it moves down one id.
    pub fn remove_cell(&mut self, id: CellId) -> Result<CellRow, TableError> {
        if id == MEDIUM || !self.contains(id) {
            return Err(TableError::UnknownCell(id));
        }
        let removed = self.row(id)?;
        let index = id as usize;
        self.names.remove(index);
        self.type_ids.remove(index);
        self.volumes.remove(index);
        self.desired_volumes.remove(index);
        self.perimeters.remove(index);
        self.desired_perimeters.remove(index);
        for (_, column) in &mut self.properties {
            column.remove(index);
        }
        self.debug_assert_coherent();
        Ok(removed)
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyColumn> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, column)| column)
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.properties.iter().map(|(n, _)| n.as_str())
    }

    /// Value of property `name` for cell `id`; `Ok(None)` is the "no value" marker.
    pub fn value(&self, id: CellId, name: &str) -> Result<Option<PropertyValue>, TableError> {
        if !self.contains(id) {
            return Err(TableError::UnknownCell(id));
        }
        let column = self
            .property(name)
            .ok_or_else(|| TableError::UnknownProperty(name.to_owned()))?;
        Ok(column.get(id as usize))
    }

    /// Copy of the full row for `id`.
    pub fn row(&self, id: CellId) -> Result<CellRow, TableError> {
        if !self.contains(id) {
            return Err(TableError::UnknownCell(id));
        }
        let i = id as usize;
        Ok(CellRow {
            id,
            name: self.names[i].clone(),
            type_id: self.type_ids[i],
            volume: self.volumes[i],
            desired_volume: self.desired_volumes[i],
            perimeter: self.perimeters[i],
            desired_perimeter: self.desired_perimeters[i],
            properties: self
                .properties
                .iter()
                .map(|(n, column)| (n.clone(), column.get(i)))
                .collect(),
        })
    }

    /// Zero every volume and perimeter before a full recount.
    pub(crate) fn clear_geometry(&mut self) {
        self.volumes.fill(0);
        self.perimeters.fill(0);
    }

    #[inline]
    fn debug_assert_coherent(&self) {
        debug_assert_eq!(self.names.len(), self.type_ids.len());
        debug_assert_eq!(self.names.len(), self.volumes.len());
        debug_assert_eq!(self.names.len(), self.desired_volumes.len());
        debug_assert_eq!(self.names.len(), self.perimeters.len());
        debug_assert_eq!(self.names.len(), self.desired_perimeters.len());
        debug_assert!(self.properties.iter().all(|(_, c)| c.len() == self.names.len()));
    }
}

impl fmt::Display for CellTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>12} {:>7} {:>7} {:>7} {:>14} {:>10} {:>17}",
            "names", "cellIDs", "typeIDs", "volumes", "desiredVolumes", "perimeters", "desiredPerimeters"
        )?;
        for (name, _) in &self.properties {
            write!(f, " {name:>12}")?;
        }
        writeln!(f)?;
        for i in 0..self.len() {
            write!(
                f,
                "{:>12} {:>7} {:>7} {:>7} {:>14} {:>10} {:>17}",
                self.names[i],
                i,
                self.type_ids[i],
                self.volumes[i],
                self.desired_volumes[i],
                self.perimeters[i],
                self.desired_perimeters[i]
            )?;
            for (_, column) in &self.properties {
                match column.get(i) {
                    Some(value) => write!(f, " {:>12}", value.to_string())?,
                    None => write!(f, " {:>12}", "missing")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
