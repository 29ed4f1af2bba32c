//! Headless turn loop
//!
//! Everything that acts sits in the world's turn queue. The entity with the
//! lowest delay goes next and pays for its action by adding to its own
//! delay. A dedicated turn entity comes around once per `turn_interval`,
//! pulls every delay back down by that amount, and clears out corpses.

use anyhow::{Context, Result};
use delve_core::{
    Attributes, AttributesModifier, Direction, Identity, Material, ParticleEmitter, Position,
    ATTRIBUTE_DEFAULT, HEALTH_FULL,
};
use delve_ecs::{EntityHandle, EntityIndex, EntitySet, Filter, PartType, World};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::settings::GameSettings;

/// Random tiles tried before giving up on a spawn
const SPAWN_ATTEMPTS: usize = 100;

/// Outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub turns: u32,
    pub actions: u32,
    pub kills: u32,
    pub survivors: usize,
    pub player_alive: bool,
}

pub struct Game {
    world: World,
    rng: StdRng,
    width: u16,
    height: u16,
    interval: i16,
    turn_entity: EntityHandle,
    player: EntityHandle,
    turns: u32,
    actions: u32,
    kills: u32,
}

impl Game {
    pub fn new(settings: &GameSettings) -> Result<Self> {
        let mut world = World::with_config(settings.ecs.clone());
        let interval = settings.turn_interval.max(1);

        let turn = world.alloc().context("Failed to allocate the turn entity")?;
        world.schedule(turn, interval)?;
        let turn_entity = world.handle(turn)?;

        let mut game = Self {
            world,
            rng: StdRng::seed_from_u64(settings.seed),
            width: settings.map_width.max(1),
            height: settings.map_height.max(1),
            interval,
            turn_entity,
            player: EntityHandle::default(),
            turns: 0,
            actions: 0,
            kills: 0,
        };

        let player = game
            .spawn_creature()?
            .context("No free tile for the player")?;
        game.equip_player(player)?;
        game.player = game.world.handle(player)?;

        for _ in 0..settings.monsters {
            match game.spawn_creature() {
                Ok(Some(_)) => {}
                Ok(None) => {
                    warn!("No free tile left, skipping remaining monsters");
                    break;
                }
                Err(e) => {
                    warn!("Could not spawn monster: {}", e);
                    break;
                }
            }
        }

        info!(
            creatures = game.creatures().len(),
            entities = game.world.live_count(),
            "World ready"
        );
        Ok(game)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn player(&self) -> EntityHandle {
        self.player
    }

    /// Run until `max_turns` turn cycles have passed or the fight is over.
    pub fn run(&mut self, max_turns: u32) -> Result<Summary> {
        while self.turns < max_turns && !self.is_over() {
            self.step()?;
        }
        Ok(self.summary())
    }

    /// Let the next entity in the queue act.
    pub fn step(&mut self) -> Result<()> {
        let next = self.world.peek_turn()?;
        let entity = self.world.resolve(next)?;
        if next == self.turn_entity {
            self.process_turn_entity(entity)?;
        } else {
            self.take_action(entity)?;
        }
        Ok(())
    }

    pub fn is_over(&self) -> bool {
        !self.world.is_alive(self.player) || self.creatures().len() <= 1
    }

    pub fn summary(&self) -> Summary {
        Summary {
            turns: self.turns,
            actions: self.actions,
            kills: self.kills,
            survivors: self.creatures().len(),
            player_alive: self.world.is_alive(self.player),
        }
    }

    /// Log the queue in the order entities will act
    pub fn log_turn_order(&self) {
        let parts = self.world.parts();
        for handle in self.world.turn_queue().ordered(parts) {
            let delay = parts.turn_schedule.get(handle.index()).delay;
            debug!(entity = %handle, delay, "queued");
        }
    }

    /// Living creatures, in slot order
    pub fn creatures(&self) -> Vec<EntityIndex> {
        let living = Filter::new()
            .with(PartType::Position)
            .with(PartType::Health)
            .without(PartType::IsDead);
        self.world.query_filter(&living).collect()
    }

    /// Base attributes of whoever holds `entity`, plus every equipped modifier
    /// anywhere in their possession tree
    pub fn effective_attributes(&self, entity: EntityIndex) -> Attributes {
        let Some(owner) = self.world.attributes_ancestor(entity) else {
            return Attributes::default();
        };
        let parts = self.world.parts();
        let mut attrs = parts.attributes.get(owner);

        let mut gear = EntitySet::new();
        gear.add(owner);
        self.world.expand_descendants(&mut gear);
        let worn = |i| parts.is_equipped.test(i) && parts.attributes_modifier.has(i);
        for item in gear.query(worn) {
            attrs = attrs.apply(&parts.attributes_modifier.get(item));
        }
        attrs
    }

    fn process_turn_entity(&mut self, turn: EntityIndex) -> Result<()> {
        self.world.add_delay(turn, self.interval)?;
        // keep delays from growing without bound; relative order is unchanged
        self.world.shift_delays(-self.interval);
        self.turns += 1;

        let mut corpses: EntitySet = self.world.query(|p, w| p.is_dead.word(w)).collect();
        if !corpses.is_empty() {
            let freed = self.world.free_set(&mut corpses)?;
            debug!(turn = self.turns, freed, "Cleared corpses");
        }
        Ok(())
    }

    fn take_action(&mut self, entity: EntityIndex) -> Result<()> {
        if let Some(pos) = self.world.parts().position.try_get(entity) {
            let dir = Direction::from_index(self.rng.gen_range(0..Direction::ALL.len()));
            if let Some(to) = pos.step(dir, self.width, self.height) {
                match self.creature_at(to) {
                    Some(target) => self.attack(entity, target)?,
                    None => *self.world.parts_mut().position.get_mut(entity) = to,
                }
            }
        }
        self.actions += 1;
        self.world.add_delay(entity, self.interval)?;
        Ok(())
    }

    fn attack(&mut self, attacker: EntityIndex, target: EntityIndex) -> Result<()> {
        let attrs = self.effective_attributes(attacker);
        let damage = self.rng.gen_range(1..=6u8) + attrs.str / 2;

        let health = self.world.parts_mut().health.get_mut(target);
        *health = health.saturating_sub(damage);
        let remaining = *health;
        debug!(attacker, target, damage, remaining, "Attack");

        if remaining == 0 {
            self.world.parts_mut().is_dead.set(target);
            self.world.unschedule(target)?;
            self.kills += 1;
            info!(attacker, target, "Creature died");
        }
        Ok(())
    }

    fn creature_at(&self, pos: Position) -> Option<EntityIndex> {
        let parts = self.world.parts();
        self.world
            .query(|p, w| p.position.word(w) & p.health.word(w) & !p.is_dead.word(w))
            .find(|&i| parts.position.get(i) == pos)
    }

    fn random_free_tile(&mut self) -> Option<Position> {
        for _ in 0..SPAWN_ATTEMPTS {
            let pos = Position::new(
                self.rng.gen_range(0..self.width),
                self.rng.gen_range(0..self.height),
            );
            if self.creature_at(pos).is_none() {
                return Some(pos);
            }
        }
        None
    }

    fn spawn_creature(&mut self) -> delve_ecs::Result<Option<EntityIndex>> {
        let Some(pos) = self.random_free_tile() else {
            return Ok(None);
        };
        let entity = self.world.alloc()?;
        let parts = self.world.parts_mut();
        parts.position.add(entity, pos);
        parts.health.add(entity, HEALTH_FULL);
        parts.attributes.add(
            entity,
            Attributes::new(
                ATTRIBUTE_DEFAULT,
                ATTRIBUTE_DEFAULT,
                ATTRIBUTE_DEFAULT,
                ATTRIBUTE_DEFAULT,
            ),
        );
        self.world.schedule(entity, 0)?;
        debug!(entity, x = pos.x, y = pos.y, "Spawned creature");
        Ok(Some(entity))
    }

    /// A bag with a torch in it, and a sword in hand
    fn equip_player(&mut self, player: EntityIndex) -> delve_ecs::Result<()> {
        let bag = self.world.alloc()?;
        let torch = self.world.alloc()?;
        let sword = self.world.alloc()?;

        let parts = self.world.parts_mut();
        parts.identity.add(player, Identity::GROG);
        parts.attributes.add(player, Attributes::new(4, 3, ATTRIBUTE_DEFAULT, 3));

        parts.is_inventory.set(bag);
        parts.parent.add(bag, player);
        parts.material.add(bag, Material::Leather);

        parts.parent.add(torch, bag);
        parts.material.add(torch, Material::Wood);
        parts.particle_emitter.add(
            torch,
            ParticleEmitter {
                particle_type: 0,
                countdown_ticks: 5,
            },
        );

        parts.is_equipped.set(sword);
        parts.parent.add(sword, player);
        parts.identity.add(sword, Identity::EXCALIBUR);
        parts.material.add(sword, Material::Steel);
        parts
            .attributes_modifier
            .add(sword, AttributesModifier::new(2, 0, 0, 0));
        Ok(())
    }
}
