// src/tournament/seeding.rs
//! Посев и размер сетки.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{thread_rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::domain::UserId;

/// Как упорядочить участников перед посевом.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Seeding {
    /// Порядок регистрации = порядок посева.
    #[default]
    EntryOrder,
    /// Случайная жеребьёвка. С `Some(seed)` — воспроизводимая.
    Shuffled { seed: Option<u64> },
}

/// Порядок посевов по позициям первого раунда для сетки размера `size`.
///
/// Пары идут подряд: позиции `2m-2` и `2m-1` — это матч `m`.
/// Для 4: `[1, 4, 2, 3]`, для 8: `[1, 8, 4, 5, 2, 7, 3, 6]`.
/// Сильнейшие посевы встречаются только в поздних раундах, а "баи"
/// (посевы больше числа участников) достаются верхним посевам.
pub fn seed_order(size: u32) -> Vec<u32> {
    let mut order = vec![1u32];
    while (order.len() as u32) < size.max(1) {
        let next_len = order.len() as u32 * 2;
        order = order
            .iter()
            .flat_map(|&seed| [seed, next_len + 1 - seed])
            .collect();
    }
    order
}

/// Размер сетки по умолчанию: ближайшая степень двойки сверху.
pub fn default_bracket_size(participants: usize) -> u32 {
    (participants.max(2) as u32).next_power_of_two()
}

/// Проверить заданный размер сетки.
///
/// Размер — степень двойки, вмещает всех и не настолько велик, чтобы
/// в первом раунде встретились два бая.
pub fn validate_bracket_size(size: u32, participants: usize) -> Result<(), String> {
    let count = participants as u32;
    if count < 2 {
        return Err(format!("нужно минимум 2 участника, есть {}", count));
    }
    if !size.is_power_of_two() || size < 2 {
        return Err(format!("размер сетки {} — не степень двойки", size));
    }
    if size < count {
        return Err(format!("сетка на {} мест не вмещает {} участников", size, count));
    }
    if size >= count * 2 {
        return Err(format!(
            "сетка на {} мест слишком велика для {} участников",
            size, count
        ));
    }
    Ok(())
}

/// Упорядочить участников согласно режиму посева.
///
/// Жеребьёвка с seed идёт через `StdRng`: один seed даёт одну сетку,
/// так спорный посев можно воспроизвести.
pub fn arrange(mut participants: Vec<UserId>, seeding: Seeding) -> Vec<UserId> {
    match seeding {
        Seeding::EntryOrder => {}
        Seeding::Shuffled { seed: Some(seed) } => {
            participants.shuffle(&mut StdRng::seed_from_u64(seed));
        }
        Seeding::Shuffled { seed: None } => {
            participants.shuffle(&mut thread_rng());
        }
    }
    participants
}
