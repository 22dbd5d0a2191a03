//! Logical column roles mapped to sheet column indices.

use serde::{Deserialize, Serialize};

/// A column on a per-symbol data sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnRole {
    Date,
    /// Price field by position; field 0 is the adjusted close.
    Field(usize),
    /// Moving average by spec position.
    MovingAverage(usize),
}

impl ColumnRole {
    pub const ADJUSTED_CLOSE: ColumnRole = ColumnRole::Field(0);
}

/// Column layout of a data sheet: Date, price fields, then one column per
/// moving average in spec order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataColumnMap {
    field_count: usize,
    moving_average_count: usize,
}

impl DataColumnMap {
    pub fn new(field_count: usize, moving_average_count: usize) -> Self {
        Self {
            field_count,
            moving_average_count,
        }
    }

    /// Column index for a role, or `None` if the role is out of range.
    pub fn index(&self, role: ColumnRole) -> Option<usize> {
        match role {
            ColumnRole::Date => Some(0),
            ColumnRole::Field(i) if i < self.field_count => Some(1 + i),
            ColumnRole::MovingAverage(k) if k < self.moving_average_count => {
                Some(1 + self.field_count + k)
            }
            _ => None,
        }
    }

    pub fn width(&self) -> usize {
        1 + self.field_count + self.moving_average_count
    }

    pub fn roles(&self) -> impl Iterator<Item = ColumnRole> + '_ {
        std::iter::once(ColumnRole::Date)
            .chain((0..self.field_count).map(ColumnRole::Field))
            .chain((0..self.moving_average_count).map(ColumnRole::MovingAverage))
    }
}

/// Columns of a dashboard signal table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DashboardColumn {
    Fund,
    Position,
    Variance,
}

impl DashboardColumn {
    pub const ALL: [DashboardColumn; 3] = [
        DashboardColumn::Fund,
        DashboardColumn::Position,
        DashboardColumn::Variance,
    ];

    pub fn index(self) -> usize {
        match self {
            DashboardColumn::Fund => 0,
            DashboardColumn::Position => 1,
            DashboardColumn::Variance => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DashboardColumn::Fund => "Fund",
            DashboardColumn::Position => "Position",
            DashboardColumn::Variance => "Variance",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_columns_in_order() {
        let map = DataColumnMap::new(6, 2);
        assert_eq!(map.index(ColumnRole::Date), Some(0));
        assert_eq!(map.index(ColumnRole::ADJUSTED_CLOSE), Some(1));
        assert_eq!(map.index(ColumnRole::Field(5)), Some(6));
        assert_eq!(map.index(ColumnRole::MovingAverage(0)), Some(7));
        assert_eq!(map.index(ColumnRole::MovingAverage(1)), Some(8));
        assert_eq!(map.width(), 9);
    }

    #[test]
    fn out_of_range_roles() {
        let map = DataColumnMap::new(1, 1);
        assert_eq!(map.index(ColumnRole::Field(1)), None);
        assert_eq!(map.index(ColumnRole::MovingAverage(1)), None);
    }

    #[test]
    fn roles_enumerate_width() {
        let map = DataColumnMap::new(3, 2);
        let indices: Vec<usize> = map.roles().filter_map(|r| map.index(r)).collect();
        assert_eq!(indices, (0..map.width()).collect::<Vec<_>>());
    }

    #[test]
    fn dashboard_columns() {
        let idx: Vec<usize> = DashboardColumn::ALL.iter().map(|c| c.index()).collect();
        assert_eq!(idx, vec![0, 1, 2]);
        assert_eq!(DashboardColumn::Variance.label(), "Variance");
    }
}
