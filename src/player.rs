use strata_geom::Vec3;

/// Source of the observer's world-space position, read once per tick.
pub trait Observer {
    fn position(&self) -> Vec3;
    fn set_position(&mut self, p: Vec3);
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Player {
    pub position: Vec3,
}

impl Player {
    pub fn new(position: Vec3) -> Self {
        Self { position }
    }
}

impl Observer for Player {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn set_position(&mut self, p: Vec3) {
        self.position = p;
    }
}
