//! The `trade` table of commodities and their price ranges.

use starloom_data::DataNode;

/// One commodity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Commodity {
    /// Commodity name, e.g. `Food`.
    pub name: String,
    /// Lowest base price.
    pub low: i64,
    /// Highest base price.
    pub high: i64,
    /// Specific goods that missions may name as cargo.
    pub items: Vec<String>,
}

/// Every commodity, in definition order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trade {
    /// Ordinary commodities.
    pub commodities: Vec<Commodity>,
    /// Goods that are only carried by missions.
    pub special: Vec<Commodity>,
}

impl Trade {
    /// Apply one `trade` root. A commodity defined again replaces the old
    /// price range and adds its items.
    pub fn load(&mut self, node: &DataNode) {
        for child in node.children() {
            match child.key() {
                "commodity" if child.size() >= 4 => {
                    if let Some(commodity) = find_or_push(&mut self.commodities, child.token(1)) {
                        commodity.low = starloom_conditions::expression::to_i64(child.value(2));
                        commodity.high = starloom_conditions::expression::to_i64(child.value(3));
                        add_items(commodity, child);
                    }
                }
                "commodity" if child.size() >= 2 => {
                    if let Some(commodity) = find_or_push(&mut self.special, child.token(1)) {
                        add_items(commodity, child);
                    }
                }
                "clear" => {
                    self.commodities.clear();
                    self.special.clear();
                }
                _ => {
                    child.print_trace("Skipping unrecognized attribute:");
                }
            }
        }
    }

    /// The commodity named `name`, ordinary or special.
    pub fn commodity(&self, name: &str) -> Option<&Commodity> {
        self.commodities
            .iter()
            .chain(&self.special)
            .find(|c| c.name == name)
    }
}

fn find_or_push<'a>(list: &'a mut Vec<Commodity>, name: &str) -> Option<&'a mut Commodity> {
    if !list.iter().any(|c| c.name == name) {
        list.push(Commodity {
            name: name.to_owned(),
            ..Commodity::default()
        });
    }
    list.iter_mut().find(|c| c.name == name)
}

fn add_items(commodity: &mut Commodity, node: &DataNode) {
    for grand in node.children() {
        let item = grand.token(0);
        if !commodity.items.iter().any(|i| i == item) {
            commodity.items.push(item.to_owned());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use starloom_data::DataFile;

    #[test]
    fn commodities_merge_by_name() {
        let file = DataFile::parse(
            "trade\n\tcommodity Food 100 600\n\t\tgrain\n\tcommodity Relics\n\t\tbones\n\
             trade\n\tcommodity Food 150 650\n\t\tfish\n",
            "t",
        )
        .unwrap();
        let mut trade = Trade::default();
        for node in file.nodes() {
            trade.load(node);
        }
        let food = trade.commodity("Food").unwrap();
        assert_eq!((food.low, food.high), (150, 650));
        assert_eq!(food.items, ["grain", "fish"]);
        assert_eq!(trade.special[0].name, "Relics");
    }
}
